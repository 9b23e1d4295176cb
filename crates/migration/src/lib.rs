pub use sea_orm_migration::prelude::*;

mod m20240301_000001_init;
mod m20240612_000001_money_cents;
mod m20240705_000001_transfer_linkage;
mod m20240820_000001_idempotency;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_init::Migration),
            Box::new(m20240612_000001_money_cents::Migration),
            Box::new(m20240705_000001_transfer_linkage::Migration),
            Box::new(m20240820_000001_idempotency::Migration),
        ]
    }
}
