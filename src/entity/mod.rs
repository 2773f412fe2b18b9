pub mod addresses;
pub mod cart_items;
pub mod order_items;
pub mod orders;
pub mod payment_events;
pub mod product_variants;
pub mod products;
pub mod vouchers;

pub use addresses::Entity as Addresses;
pub use cart_items::Entity as CartItems;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payment_events::Entity as PaymentEvents;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
pub use vouchers::Entity as Vouchers;
