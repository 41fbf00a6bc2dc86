use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{borrow_record, category, damage_report, damage_report::DamageStatus, item, return_record},
    errors::ServiceError,
    services::{
        lending::{BorrowRecordView, Lookup, ReturnRecordView},
        DateRange,
    },
};

/// Stock position of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InventorySummaryRow {
    pub item_id: Uuid,
    pub item_name: String,
    pub category_id: Uuid,
    pub category_name: Option<String>,
    pub status: String,
    /// Units in the warehouse right now
    pub on_hand: i64,
    /// Units out on borrows not yet returned
    pub on_loan: i64,
    /// `on_hand + on_loan`
    pub total_tracked: i64,
    pub open_borrows: i64,
    /// Units reported broken on reports that were not rejected
    pub reported_broken: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InventoryTotals {
    pub on_hand: i64,
    pub on_loan: i64,
    pub total_tracked: i64,
    pub open_borrows: i64,
    pub reported_broken: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InventorySummary {
    pub items: Vec<InventorySummaryRow>,
    pub totals: InventoryTotals,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Borrow,
    Return,
    #[default]
    All,
}

impl ReportKind {
    fn includes_borrows(self) -> bool {
        matches!(self, ReportKind::Borrow | ReportKind::All)
    }

    fn includes_returns(self) -> bool {
        matches!(self, ReportKind::Return | ReportKind::All)
    }
}

impl FromStr for ReportKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "borrow" => Ok(ReportKind::Borrow),
            "return" => Ok(ReportKind::Return),
            "" | "all" => Ok(ReportKind::All),
            other => Err(ServiceError::InvalidInput(format!(
                "Invalid report type '{}': expected borrow, return or all",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    pub project_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub dates: DateRange,
    pub kind: ReportKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DamageSummary {
    pub report_id: Uuid,
    pub status: DamageStatus,
    pub broken_units: i32,
    pub description: String,
}

/// A return joined with the borrow it settles and the item's first damage report in the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReturnReportEntry {
    #[serde(flatten)]
    pub record: ReturnRecordView,
    pub borrow_date: Option<chrono::NaiveDate>,
    pub due_date: Option<chrono::NaiveDate>,
    pub borrowed_quantity: Option<i32>,
    pub damage: Option<DamageSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProjectLendingReport {
    pub project_id: Uuid,
    pub project_name: Option<String>,
    pub borrows: Vec<BorrowRecordView>,
    pub returns: Vec<ReturnReportEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LendingReport {
    pub kind: ReportKind,
    pub projects: Vec<ProjectLendingReport>,
}

fn project_group<'a>(
    by_project: &'a mut BTreeMap<Uuid, ProjectLendingReport>,
    lookup: &Lookup,
    project_id: Uuid,
) -> &'a mut ProjectLendingReport {
    by_project
        .entry(project_id)
        .or_insert_with(|| ProjectLendingReport {
            project_id,
            project_name: lookup.project_name(project_id),
            borrows: Vec::new(),
            returns: Vec::new(),
        })
}

#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Per-item stock position, optionally limited to one category.
    #[instrument(skip(self))]
    pub async fn inventory_summary(
        &self,
        category_id: Option<Uuid>,
    ) -> Result<InventorySummary, ServiceError> {
        let mut items_query = item::Entity::find().order_by_asc(item::Column::Name);
        if let Some(category_id) = category_id {
            items_query = items_query.filter(item::Column::CategoryId.eq(category_id));
        }
        let items = items_query.all(&*self.db).await?;
        if items.is_empty() {
            return Ok(InventorySummary {
                items: Vec::new(),
                totals: InventoryTotals::default(),
            });
        }
        let item_ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();

        let categories: HashMap<Uuid, String> = category::Entity::find()
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let mut loans: HashMap<Uuid, (i64, i64)> = HashMap::new();
        for borrow in borrow_record::Entity::find()
            .filter(borrow_record::Column::ItemId.is_in(item_ids.clone()))
            .filter(borrow_record::Column::RemainingQuantity.gt(0))
            .all(&*self.db)
            .await?
        {
            let entry = loans.entry(borrow.item_id).or_default();
            entry.0 += i64::from(borrow.remaining_quantity);
            entry.1 += 1;
        }

        let mut broken: HashMap<Uuid, i64> = HashMap::new();
        for report in damage_report::Entity::find()
            .filter(damage_report::Column::ItemId.is_in(item_ids))
            .all(&*self.db)
            .await?
        {
            if report.status.counts_as_broken() {
                *broken.entry(report.item_id).or_default() += i64::from(report.broken_units);
            }
        }

        let mut totals = InventoryTotals::default();
        let rows = items
            .into_iter()
            .map(|item| {
                let (on_loan, open_borrows) = loans.get(&item.id).copied().unwrap_or_default();
                let on_hand = i64::from(item.quantity);
                let reported_broken = broken.get(&item.id).copied().unwrap_or_default();

                totals.on_hand += on_hand;
                totals.on_loan += on_loan;
                totals.total_tracked += on_hand + on_loan;
                totals.open_borrows += open_borrows;
                totals.reported_broken += reported_broken;

                InventorySummaryRow {
                    category_name: categories.get(&item.category_id).cloned(),
                    item_id: item.id,
                    item_name: item.name,
                    category_id: item.category_id,
                    status: item.status,
                    on_hand,
                    on_loan,
                    total_tracked: on_hand + on_loan,
                    open_borrows,
                    reported_broken,
                }
            })
            .collect();

        Ok(InventorySummary {
            items: rows,
            totals,
        })
    }

    /// Borrows and returns grouped by project. Each return is joined with its
    /// borrow and the earliest damage report for the same item in that project.
    #[instrument(skip(self))]
    pub async fn lending_report(&self, query: ReportQuery) -> Result<LendingReport, ServiceError> {
        let borrows = if query.kind.includes_borrows() {
            let mut select = borrow_record::Entity::find();
            if let Some(project_id) = query.project_id {
                select = select.filter(borrow_record::Column::ProjectId.eq(project_id));
            }
            if let Some(item_id) = query.item_id {
                select = select.filter(borrow_record::Column::ItemId.eq(item_id));
            }
            if let Some(start) = query.dates.start {
                select = select.filter(borrow_record::Column::BorrowDate.gte(start));
            }
            if let Some(end) = query.dates.end {
                select = select.filter(borrow_record::Column::BorrowDate.lte(end));
            }
            select
                .order_by_asc(borrow_record::Column::BorrowDate)
                .order_by_asc(borrow_record::Column::CreatedAt)
                .all(&*self.db)
                .await?
        } else {
            Vec::new()
        };

        let returns = if query.kind.includes_returns() {
            let mut select = return_record::Entity::find();
            if let Some(project_id) = query.project_id {
                select = select.filter(return_record::Column::ProjectId.eq(project_id));
            }
            if let Some(item_id) = query.item_id {
                select = select.filter(return_record::Column::ItemId.eq(item_id));
            }
            if let Some(start) = query.dates.start {
                select = select.filter(return_record::Column::ReturnDate.gte(start));
            }
            if let Some(end) = query.dates.end {
                select = select.filter(return_record::Column::ReturnDate.lte(end));
            }
            select
                .order_by_asc(return_record::Column::ReturnDate)
                .order_by_asc(return_record::Column::CreatedAt)
                .all(&*self.db)
                .await?
        } else {
            Vec::new()
        };

        // Borrows settled by the returns in range, whether or not they fall in range themselves.
        let settled: HashMap<Uuid, borrow_record::Model> = if returns.is_empty() {
            HashMap::new()
        } else {
            borrow_record::Entity::find()
                .filter(
                    borrow_record::Column::Id
                        .is_in(returns.iter().map(|r| r.borrow_id).collect::<Vec<_>>()),
                )
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|b| (b.id, b))
                .collect()
        };

        let mut first_damage: HashMap<(Uuid, Uuid), damage_report::Model> = HashMap::new();
        if !returns.is_empty() {
            for report in damage_report::Entity::find()
                .filter(
                    damage_report::Column::ItemId
                        .is_in(returns.iter().map(|r| r.item_id).collect::<Vec<_>>()),
                )
                .order_by_asc(damage_report::Column::CreatedAt)
                .all(&*self.db)
                .await?
            {
                first_damage
                    .entry((report.item_id, report.project_id))
                    .or_insert(report);
            }
        }

        let lookup = Lookup::load(
            &*self.db,
            borrows
                .iter()
                .map(|b| b.item_id)
                .chain(returns.iter().map(|r| r.item_id))
                .collect(),
            borrows
                .iter()
                .map(|b| b.project_id)
                .chain(returns.iter().map(|r| r.project_id))
                .collect(),
            borrows
                .iter()
                .map(|b| b.user_id)
                .chain(returns.iter().map(|r| r.user_id))
                .collect(),
        )
        .await?;

        let mut by_project: BTreeMap<Uuid, ProjectLendingReport> = BTreeMap::new();

        for borrow in borrows {
            let project_id = borrow.project_id;
            let view = lookup.borrow_view(borrow);
            project_group(&mut by_project, &lookup, project_id)
                .borrows
                .push(view);
        }

        for ret in returns {
            let project_id = ret.project_id;
            let settled_borrow = settled.get(&ret.borrow_id);
            let damage = first_damage
                .get(&(ret.item_id, ret.project_id))
                .map(|d| DamageSummary {
                    report_id: d.id,
                    status: d.status,
                    broken_units: d.broken_units,
                    description: d.description.clone(),
                });
            let entry = ReturnReportEntry {
                borrow_date: settled_borrow.map(|b| b.borrow_date),
                due_date: settled_borrow.map(|b| b.due_date),
                borrowed_quantity: settled_borrow.map(|b| b.quantity),
                damage,
                record: lookup.return_view(ret),
            };
            project_group(&mut by_project, &lookup, project_id)
                .returns
                .push(entry);
        }

        let mut projects: Vec<ProjectLendingReport> = by_project.into_values().collect();
        projects.sort_by(|a, b| a.project_name.cmp(&b.project_name));

        Ok(LendingReport {
            kind: query.kind,
            projects,
        })
    }
}
