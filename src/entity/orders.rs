use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub order_id: Uuid,
    /// Human-typable payment reference (e.g. "DH480A12F7"); what customers
    /// put in the bank transfer description.
    #[sea_orm(unique)]
    pub order_code: String,
    pub user_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub total_amount: i64,
    pub payment_method: String,
    pub shipping_method: String,
    pub shipping_fee: i64,
    pub discount_amount: i64,
    pub voucher_id: Option<i32>,
    /// Immutable snapshot taken at commit, not a live address reference.
    pub shipping_address: Json,
    pub note: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(
        belongs_to = "super::vouchers::Entity",
        from = "Column::VoucherId",
        to = "super::vouchers::Column::VoucherId"
    )]
    Voucher,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::vouchers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Voucher.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
