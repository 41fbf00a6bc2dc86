//! Borrow/return transaction manager.
//!
//! Stock lives in `items.quantity`; each borrow is an outstanding claim whose
//! unreturned part is `borrow_records.remaining_quantity`. For every item,
//! `quantity + sum(remaining_quantity)` only changes through audited stock
//! adjustments, never through borrow or return.
//!
//! Both operations run inside [`in_transaction`]. The contended row is locked
//! first ([`lock_for_update`]) and then changed with a conditional update whose
//! `WHERE` clause re-states the precondition, so a stale read can never
//! overdraw stock or over-return a borrow.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Capability},
    db::{in_transaction, lock_for_share, lock_for_update},
    entities::{borrow_record, category, item, project, return_record, user},
    errors::ServiceError,
    events::{EventSender, LendingEvent},
    services::DateRange,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowItemCommand {
    pub item_id: Uuid,
    pub project_id: Uuid,
    pub quantity: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnItemCommand {
    pub borrow_id: Uuid,
    pub quantity: i32,
    pub return_date: NaiveDate,
}

/// A borrow record with its item, category, project and borrower resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BorrowRecordView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: Option<String>,
    pub item_id: Uuid,
    pub item_name: Option<String>,
    pub category_name: Option<String>,
    pub project_id: Uuid,
    pub project_name: Option<String>,
    pub quantity: i32,
    pub remaining_quantity: i32,
    pub returned_quantity: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A return record with its item, category, project and returning user resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReturnRecordView {
    pub id: Uuid,
    pub borrow_id: Uuid,
    pub user_id: Uuid,
    pub username: Option<String>,
    pub item_id: Uuid,
    pub item_name: Option<String>,
    pub category_name: Option<String>,
    pub project_id: Uuid,
    pub project_name: Option<String>,
    pub quantity: i32,
    pub return_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct BorrowQuery {
    pub project_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub dates: DateRange,
    pub outstanding_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReturnQuery {
    pub project_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub borrow_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub dates: DateRange,
}

/// Display names for the rows referenced by a batch of lending records.
#[derive(Debug, Default)]
pub(crate) struct Lookup {
    pub items: HashMap<Uuid, item::Model>,
    pub categories: HashMap<Uuid, category::Model>,
    pub projects: HashMap<Uuid, project::Model>,
    pub users: HashMap<Uuid, user::Model>,
}

impl Lookup {
    pub(crate) async fn load<C: ConnectionTrait>(
        db: &C,
        item_ids: HashSet<Uuid>,
        project_ids: HashSet<Uuid>,
        user_ids: HashSet<Uuid>,
    ) -> Result<Self, ServiceError> {
        let mut lookup = Lookup::default();

        if !item_ids.is_empty() {
            lookup.items = item::Entity::find()
                .filter(item::Column::Id.is_in(item_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m))
                .collect();
        }

        let category_ids: HashSet<Uuid> = lookup.items.values().map(|i| i.category_id).collect();
        if !category_ids.is_empty() {
            lookup.categories = category::Entity::find()
                .filter(category::Column::Id.is_in(category_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m))
                .collect();
        }

        if !project_ids.is_empty() {
            lookup.projects = project::Entity::find()
                .filter(project::Column::Id.is_in(project_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m))
                .collect();
        }

        if !user_ids.is_empty() {
            lookup.users = user::Entity::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m))
                .collect();
        }

        Ok(lookup)
    }

    pub(crate) fn item_name(&self, id: Uuid) -> Option<String> {
        self.items.get(&id).map(|i| i.name.clone())
    }

    pub(crate) fn category_name(&self, item_id: Uuid) -> Option<String> {
        self.items
            .get(&item_id)
            .and_then(|i| self.categories.get(&i.category_id))
            .map(|c| c.name.clone())
    }

    pub(crate) fn project_name(&self, id: Uuid) -> Option<String> {
        self.projects.get(&id).map(|p| p.name.clone())
    }

    pub(crate) fn username(&self, id: Uuid) -> Option<String> {
        self.users.get(&id).map(|u| u.username.clone())
    }

    pub(crate) fn borrow_view(&self, b: borrow_record::Model) -> BorrowRecordView {
        BorrowRecordView {
            username: self.username(b.user_id),
            item_name: self.item_name(b.item_id),
            category_name: self.category_name(b.item_id),
            project_name: self.project_name(b.project_id),
            returned_quantity: b.returned_quantity(),
            id: b.id,
            user_id: b.user_id,
            item_id: b.item_id,
            project_id: b.project_id,
            quantity: b.quantity,
            remaining_quantity: b.remaining_quantity,
            borrow_date: b.borrow_date,
            due_date: b.due_date,
            created_at: b.created_at,
        }
    }

    pub(crate) fn return_view(&self, r: return_record::Model) -> ReturnRecordView {
        ReturnRecordView {
            username: self.username(r.user_id),
            item_name: self.item_name(r.item_id),
            category_name: self.category_name(r.item_id),
            project_name: self.project_name(r.project_id),
            id: r.id,
            borrow_id: r.borrow_id,
            user_id: r.user_id,
            item_id: r.item_id,
            project_id: r.project_id,
            quantity: r.quantity,
            return_date: r.return_date,
            created_at: r.created_at,
        }
    }
}

pub(crate) async fn resolve_borrows<C: ConnectionTrait>(
    db: &C,
    records: Vec<borrow_record::Model>,
) -> Result<Vec<BorrowRecordView>, ServiceError> {
    let lookup = Lookup::load(
        db,
        records.iter().map(|r| r.item_id).collect(),
        records.iter().map(|r| r.project_id).collect(),
        records.iter().map(|r| r.user_id).collect(),
    )
    .await?;
    Ok(records.into_iter().map(|r| lookup.borrow_view(r)).collect())
}

pub(crate) async fn resolve_returns<C: ConnectionTrait>(
    db: &C,
    records: Vec<return_record::Model>,
) -> Result<Vec<ReturnRecordView>, ServiceError> {
    let lookup = Lookup::load(
        db,
        records.iter().map(|r| r.item_id).collect(),
        records.iter().map(|r| r.project_id).collect(),
        records.iter().map(|r| r.user_id).collect(),
    )
    .await?;
    Ok(records.into_iter().map(|r| lookup.return_view(r)).collect())
}

#[derive(Clone)]
pub struct LendingService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl LendingService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Takes `quantity` units of an item out of stock for a project.
    ///
    /// # Errors
    /// * `InvalidInput` for a non-positive quantity or a due date before the borrow date
    /// * `NotFound` when the project or item does not exist
    /// * `InsufficientStock` when fewer than `quantity` units are on hand
    /// * `DatabaseError` when the transaction cannot commit; nothing is applied
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn borrow_item(
        &self,
        principal: &AuthUser,
        cmd: BorrowItemCommand,
    ) -> Result<BorrowRecordView, ServiceError> {
        principal.require(Capability::BorrowItems)?;

        if cmd.quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be greater than zero".into(),
            ));
        }
        if cmd.due_date < cmd.borrow_date {
            return Err(ServiceError::InvalidInput(format!(
                "due_date {} is before borrow_date {}",
                cmd.due_date, cmd.borrow_date
            )));
        }

        let user_id = principal.user_id;
        let outcome = in_transaction(&self.db, "borrow_item", move |txn| {
            Box::pin(async move {
                lock_for_share(
                    project::Entity::find_by_id(cmd.project_id),
                    txn.get_database_backend(),
                )
                .one(txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Project {} not found", cmd.project_id))
                })?;

                let item = lock_for_update(
                    item::Entity::find_by_id(cmd.item_id),
                    txn.get_database_backend(),
                )
                .one(txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", cmd.item_id)))?;

                if item.quantity < cmd.quantity {
                    return Err(ServiceError::InsufficientStock {
                        item_id: item.id,
                        item_name: item.name,
                        available: item.quantity,
                        requested: cmd.quantity,
                    });
                }

                let decremented = item::Entity::update_many()
                    .col_expr(
                        item::Column::Quantity,
                        Expr::col(item::Column::Quantity).sub(cmd.quantity),
                    )
                    .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(item::Column::Id.eq(item.id))
                    .filter(item::Column::Quantity.gte(cmd.quantity))
                    .exec(txn)
                    .await?;

                if decremented.rows_affected == 0 {
                    let available = item::Entity::find_by_id(item.id)
                        .one(txn)
                        .await?
                        .map_or(0, |fresh| fresh.quantity);
                    return Err(ServiceError::InsufficientStock {
                        item_id: item.id,
                        item_name: item.name,
                        available,
                        requested: cmd.quantity,
                    });
                }

                let record = borrow_record::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    item_id: Set(item.id),
                    project_id: Set(cmd.project_id),
                    quantity: Set(cmd.quantity),
                    remaining_quantity: Set(cmd.quantity),
                    borrow_date: Set(cmd.borrow_date),
                    due_date: Set(cmd.due_date),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                Ok(record)
            })
        })
        .await;

        let record = match outcome {
            Ok(record) => record,
            Err(err) => {
                warn!(item_id = %cmd.item_id, quantity = cmd.quantity, error = %err, "borrow rejected");
                return Err(err);
            }
        };

        info!(
            borrow_id = %record.id,
            item_id = %record.item_id,
            quantity = record.quantity,
            "borrow committed"
        );
        self.events
            .send_or_log(LendingEvent::ItemBorrowed {
                borrow_id: record.id,
                item_id: record.item_id,
                project_id: record.project_id,
                user_id: record.user_id,
                quantity: record.quantity,
            });

        let mut views = resolve_borrows(&*self.db, vec![record]).await?;
        views
            .pop()
            .ok_or_else(|| ServiceError::InternalError("borrow view missing".into()))
    }

    /// Puts `quantity` units of a borrow back into stock.
    ///
    /// # Errors
    /// * `InvalidInput` for a non-positive quantity or a return date before the borrow date
    /// * `NotFound` when the borrow record (or its item) does not exist
    /// * `ExcessReturn` when `quantity` exceeds the units still outstanding on the borrow
    /// * `DatabaseError` when the transaction cannot commit; nothing is applied
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn return_item(
        &self,
        principal: &AuthUser,
        cmd: ReturnItemCommand,
    ) -> Result<ReturnRecordView, ServiceError> {
        principal.require(Capability::ReturnItems)?;

        if cmd.quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be greater than zero".into(),
            ));
        }

        let user_id = principal.user_id;
        let outcome = in_transaction(&self.db, "return_item", move |txn| {
            Box::pin(async move {
                let borrow = lock_for_update(
                    borrow_record::Entity::find_by_id(cmd.borrow_id),
                    txn.get_database_backend(),
                )
                .one(txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound("Original borrow record not found".into())
                })?;

                if cmd.return_date < borrow.borrow_date {
                    return Err(ServiceError::InvalidInput(format!(
                        "return_date {} is before borrow_date {}",
                        cmd.return_date, borrow.borrow_date
                    )));
                }

                if cmd.quantity > borrow.remaining_quantity {
                    return Err(ServiceError::ExcessReturn {
                        borrow_id: borrow.id,
                        requested: cmd.quantity,
                        remaining: borrow.remaining_quantity,
                    });
                }

                let claimed = borrow_record::Entity::update_many()
                    .col_expr(
                        borrow_record::Column::RemainingQuantity,
                        Expr::col(borrow_record::Column::RemainingQuantity).sub(cmd.quantity),
                    )
                    .filter(borrow_record::Column::Id.eq(borrow.id))
                    .filter(borrow_record::Column::RemainingQuantity.gte(cmd.quantity))
                    .exec(txn)
                    .await?;

                if claimed.rows_affected == 0 {
                    let remaining = borrow_record::Entity::find_by_id(borrow.id)
                        .one(txn)
                        .await?
                        .map_or(0, |fresh| fresh.remaining_quantity);
                    return Err(ServiceError::ExcessReturn {
                        borrow_id: borrow.id,
                        requested: cmd.quantity,
                        remaining,
                    });
                }

                let restocked = item::Entity::update_many()
                    .col_expr(
                        item::Column::Quantity,
                        Expr::col(item::Column::Quantity).add(cmd.quantity),
                    )
                    .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(item::Column::Id.eq(borrow.item_id))
                    .exec(txn)
                    .await?;

                if restocked.rows_affected == 0 {
                    return Err(ServiceError::NotFound(format!(
                        "Item {} not found",
                        borrow.item_id
                    )));
                }

                let record = return_record::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    borrow_id: Set(borrow.id),
                    user_id: Set(user_id),
                    item_id: Set(borrow.item_id),
                    project_id: Set(borrow.project_id),
                    quantity: Set(cmd.quantity),
                    return_date: Set(cmd.return_date),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                Ok((record, borrow.remaining_quantity - cmd.quantity))
            })
        })
        .await;

        let (record, remaining_on_borrow) = match outcome {
            Ok(done) => done,
            Err(err) => {
                warn!(borrow_id = %cmd.borrow_id, quantity = cmd.quantity, error = %err, "return rejected");
                return Err(err);
            }
        };

        info!(
            return_id = %record.id,
            borrow_id = %record.borrow_id,
            quantity = record.quantity,
            remaining_on_borrow,
            "return committed"
        );
        self.events
            .send_or_log(LendingEvent::ItemReturned {
                return_id: record.id,
                borrow_id: record.borrow_id,
                item_id: record.item_id,
                quantity: record.quantity,
                remaining_on_borrow,
            });

        let mut views = resolve_returns(&*self.db, vec![record]).await?;
        views
            .pop()
            .ok_or_else(|| ServiceError::InternalError("return view missing".into()))
    }

    /// A single borrow. Principals without `ViewLendingReports` only see their own.
    pub async fn get_borrow(
        &self,
        principal: &AuthUser,
        id: Uuid,
    ) -> Result<BorrowRecordView, ServiceError> {
        let record = borrow_record::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .filter(|b| b.user_id == principal.user_id || principal.can(Capability::ViewLendingReports))
            .ok_or_else(|| ServiceError::NotFound(format!("Borrow record {} not found", id)))?;

        let mut views = resolve_borrows(&*self.db, vec![record]).await?;
        views
            .pop()
            .ok_or_else(|| ServiceError::InternalError("borrow view missing".into()))
    }

    /// Newest first.
    pub async fn list_borrows(
        &self,
        query: BorrowQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<BorrowRecordView>, u64), ServiceError> {
        let mut select = borrow_record::Entity::find();
        if let Some(project_id) = query.project_id {
            select = select.filter(borrow_record::Column::ProjectId.eq(project_id));
        }
        if let Some(item_id) = query.item_id {
            select = select.filter(borrow_record::Column::ItemId.eq(item_id));
        }
        if let Some(user_id) = query.user_id {
            select = select.filter(borrow_record::Column::UserId.eq(user_id));
        }
        if let Some(start) = query.dates.start {
            select = select.filter(borrow_record::Column::BorrowDate.gte(start));
        }
        if let Some(end) = query.dates.end {
            select = select.filter(borrow_record::Column::BorrowDate.lte(end));
        }
        if query.outstanding_only {
            select = select.filter(borrow_record::Column::RemainingQuantity.gt(0));
        }

        let paginator = select
            .order_by_desc(borrow_record::Column::BorrowDate)
            .order_by_desc(borrow_record::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let records = paginator.fetch_page(super::page_index(page)).await?;

        Ok((resolve_borrows(&*self.db, records).await?, total))
    }

    /// Newest first.
    pub async fn list_returns(
        &self,
        query: ReturnQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ReturnRecordView>, u64), ServiceError> {
        let mut select = return_record::Entity::find();
        if let Some(project_id) = query.project_id {
            select = select.filter(return_record::Column::ProjectId.eq(project_id));
        }
        if let Some(item_id) = query.item_id {
            select = select.filter(return_record::Column::ItemId.eq(item_id));
        }
        if let Some(borrow_id) = query.borrow_id {
            select = select.filter(return_record::Column::BorrowId.eq(borrow_id));
        }
        if let Some(user_id) = query.user_id {
            select = select.filter(return_record::Column::UserId.eq(user_id));
        }
        if let Some(start) = query.dates.start {
            select = select.filter(return_record::Column::ReturnDate.gte(start));
        }
        if let Some(end) = query.dates.end {
            select = select.filter(return_record::Column::ReturnDate.lte(end));
        }

        let paginator = select
            .order_by_desc(return_record::Column::ReturnDate)
            .order_by_desc(return_record::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let records = paginator.fetch_page(super::page_index(page)).await?;

        Ok((resolve_returns(&*self.db, records).await?, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use assert_matches::assert_matches;

    struct Fixture {
        service: LendingService,
        principal: AuthUser,
        item_id: Uuid,
        project_id: Uuid,
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    async fn fixture(stock: i32) -> Fixture {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&db).await.unwrap();

        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set("tester".into()),
            password_hash: Set("x".into()),
            role: Set(Role::User),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let category = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Sensors".into()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let item = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Lidar".into()),
            quantity: Set(stock),
            status: Set("available".into()),
            category_id: Set(category.id),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let project = project::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Canyon".into()),
            drone_count: Set(1),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let (events, _rx) = EventSender::channel(16);
        Fixture {
            service: LendingService::new(Arc::new(db), events),
            principal: AuthUser {
                user_id: user.id,
                username: user.username,
                role: user.role,
            },
            item_id: item.id,
            project_id: project.id,
        }
    }

    fn borrow(f: &Fixture, quantity: i32) -> BorrowItemCommand {
        BorrowItemCommand {
            item_id: f.item_id,
            project_id: f.project_id,
            quantity,
            borrow_date: day(10),
            due_date: day(20),
        }
    }

    async fn stock(f: &Fixture) -> i32 {
        item::Entity::find_by_id(f.item_id)
            .one(&*f.service.db)
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    #[tokio::test]
    async fn non_positive_quantity_is_rejected_before_io() {
        let f = fixture(3).await;
        assert_matches!(
            f.service.borrow_item(&f.principal, borrow(&f, 0)).await,
            Err(ServiceError::InvalidInput(_))
        );
        assert_matches!(
            f.service
                .return_item(
                    &f.principal,
                    ReturnItemCommand {
                        borrow_id: Uuid::new_v4(),
                        quantity: -1,
                        return_date: day(11),
                    },
                )
                .await,
            Err(ServiceError::InvalidInput(_))
        );
        assert_eq!(stock(&f).await, 3);
    }

    #[tokio::test]
    async fn return_dated_before_the_borrow_is_rejected() {
        let f = fixture(3).await;
        let record = f.service.borrow_item(&f.principal, borrow(&f, 2)).await.unwrap();

        let result = f
            .service
            .return_item(
                &f.principal,
                ReturnItemCommand {
                    borrow_id: record.id,
                    quantity: 1,
                    return_date: day(9),
                },
            )
            .await;
        assert_matches!(result, Err(ServiceError::InvalidInput(_)));
        assert_eq!(stock(&f).await, 1);
    }

    #[tokio::test]
    async fn fully_returned_borrows_drop_out_of_outstanding_listing() {
        let f = fixture(6).await;
        let first = f.service.borrow_item(&f.principal, borrow(&f, 2)).await.unwrap();
        f.service.borrow_item(&f.principal, borrow(&f, 1)).await.unwrap();

        let returned = f
            .service
            .return_item(
                &f.principal,
                ReturnItemCommand {
                    borrow_id: first.id,
                    quantity: 2,
                    return_date: day(12),
                },
            )
            .await
            .unwrap();
        assert_eq!(returned.item_name.as_deref(), Some("Lidar"));
        assert_eq!(returned.project_name.as_deref(), Some("Canyon"));

        let query = BorrowQuery {
            project_id: None,
            item_id: Some(f.item_id),
            user_id: Some(f.principal.user_id),
            dates: DateRange::default(),
            outstanding_only: true,
        };
        let (open, total) = f.service.list_borrows(query, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(open[0].remaining_quantity, 1);
        assert_eq!(stock(&f).await, 5);
    }

    #[tokio::test]
    async fn insufficient_stock_reports_what_is_available() {
        let f = fixture(2).await;
        let err = f
            .service
            .borrow_item(&f.principal, borrow(&f, 5))
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ServiceError::InsufficientStock { available: 2, requested: 5, ref item_name, .. } if item_name == "Lidar"
        );
    }

    #[tokio::test]
    async fn missing_project_rolls_back_before_touching_stock() {
        let f = fixture(4).await;
        let cmd = BorrowItemCommand {
            project_id: Uuid::new_v4(),
            ..borrow(&f, 1)
        };
        assert_matches!(
            f.service.borrow_item(&f.principal, cmd).await,
            Err(ServiceError::NotFound(ref msg)) if msg.starts_with("Project")
        );
        assert_eq!(stock(&f).await, 4);
        assert_eq!(
            borrow_record::Entity::find().count(&*f.service.db).await.unwrap(),
            0
        );
    }
}
