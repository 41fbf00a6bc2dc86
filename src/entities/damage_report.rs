use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Review state of a damage report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum DamageStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Approved")]
    Approved,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
    #[sea_orm(string_value = "Resolved")]
    Resolved,
}

impl DamageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Resolved => "Resolved",
        }
    }

    /// Pending may move to any decision; Approved may only be resolved;
    /// Rejected and Resolved are final. Re-applying the current status is a no-op.
    pub fn can_transition_to(self, next: DamageStatus) -> bool {
        use DamageStatus::*;
        self == next
            || matches!(
                (self, next),
                (Pending, Approved) | (Pending, Rejected) | (Pending, Resolved) | (Approved, Resolved)
            )
    }

    /// Whether the broken units still count against usable stock.
    pub fn counts_as_broken(self) -> bool {
        self != DamageStatus::Rejected
    }
}

impl fmt::Display for DamageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DamageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!(
                "unknown damage status '{}'; expected Pending, Approved, Rejected or Resolved",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "damage_reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub item_id: Uuid,
    pub reporter_id: Uuid,
    pub project_id: Uuid,
    pub description: String,
    pub status: DamageStatus,
    pub broken_units: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ReporterId",
        to = "super::user::Column::Id"
    )]
    Reporter,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reporter.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(Some(now));
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use DamageStatus::*;

    #[rstest]
    #[case(Pending, Approved, true)]
    #[case(Pending, Rejected, true)]
    #[case(Pending, Resolved, true)]
    #[case(Approved, Resolved, true)]
    #[case(Approved, Approved, true)]
    #[case(Approved, Pending, false)]
    #[case(Approved, Rejected, false)]
    #[case(Rejected, Approved, false)]
    #[case(Rejected, Pending, false)]
    #[case(Resolved, Pending, false)]
    #[case(Resolved, Approved, false)]
    fn transition_table(#[case] from: DamageStatus, #[case] to: DamageStatus, #[case] ok: bool) {
        assert_eq!(from.can_transition_to(to), ok);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("approved".parse::<DamageStatus>(), Ok(Approved));
        assert_eq!(" Resolved ".parse::<DamageStatus>(), Ok(Resolved));
        assert!("closed".parse::<DamageStatus>().is_err());
    }

    #[test]
    fn rejected_reports_do_not_count_as_broken() {
        assert!(Pending.counts_as_broken());
        assert!(!Rejected.counts_as_broken());
    }
}
