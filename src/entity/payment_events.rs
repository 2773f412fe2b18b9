use sea_orm::entity::prelude::*;

/// Processed-notification ledger. The UNIQUE (order_id, reference_code)
/// constraint is what makes webhook reconciliation idempotent under
/// at-least-once delivery.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payment_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub event_id: Uuid,
    pub order_id: Uuid,
    pub reference_code: String,
    pub amount: i64,
    pub outcome: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::OrderId"
    )]
    Order,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
