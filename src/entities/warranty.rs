use async_trait::async_trait;
use chrono::{DateTime, Months, NaiveDate, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warranties")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub item_id: Uuid,
    #[sea_orm(unique)]
    pub serial_number: String,
    pub purchase_date: NaiveDate,
    pub coverage_months: i32,
    pub description: Option<String>,
    pub lot: Option<String>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Last day of coverage. Month arithmetic clamps to the end of shorter months.
    pub fn expires_on(&self) -> NaiveDate {
        let months = u32::try_from(self.coverage_months.max(0)).unwrap_or(0);
        self.purchase_date
            .checked_add_months(Months::new(months))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Whole days of coverage left as of `today`, never negative.
    pub fn remaining_days(&self, today: NaiveDate) -> i64 {
        (self.expires_on() - today).num_days().max(0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
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

    fn warranty(purchase: NaiveDate, months: i32) -> Model {
        Model {
            id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            serial_number: "SN-1".into(),
            purchase_date: purchase,
            coverage_months: months,
            description: None,
            lot: None,
            remark: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn expiry_adds_whole_months() {
        assert_eq!(warranty(date(2024, 1, 15), 12).expires_on(), date(2025, 1, 15));
        assert_eq!(warranty(date(2024, 1, 31), 1).expires_on(), date(2024, 2, 29));
    }

    #[test]
    fn remaining_days_never_negative() {
        let w = warranty(date(2024, 1, 1), 1);
        assert_eq!(w.remaining_days(date(2024, 1, 22)), 10);
        assert_eq!(w.remaining_days(date(2024, 6, 1)), 0);
    }
}
