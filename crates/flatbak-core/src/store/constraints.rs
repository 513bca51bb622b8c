//! Foreign-key deferral strategies.
//!
//! Restores may meet dependent rows before the rows they reference. Backends
//! that can relax foreign-key enforcement inside a transaction do so through
//! a [`ConstraintToggle`]; the others get [`NoConstraintToggle`] and rows are
//! inserted in stream order.

use tracing::debug;

use super::{Driver, Store};
use crate::error::StoreResult;

/// Relax and re-establish foreign-key enforcement on a store.
pub trait ConstraintToggle {
    /// Defer (or disable) foreign-key checking.
    fn defer_constraints(&self, store: &dyn Store) -> StoreResult<()>;

    /// Re-establish foreign-key checking.
    fn restore_constraints(&self, store: &dyn Store) -> StoreResult<()>;
}

/// Pick the strategy matching a driver family.
pub fn constraint_toggle(driver: Driver) -> Box<dyn ConstraintToggle> {
    match driver {
        Driver::Sqlite => Box::new(SqliteDeferral),
        Driver::Postgres => Box::new(PostgresDeferral),
        Driver::Mysql => Box::new(MysqlForeignKeyChecks),
        Driver::Other => Box::new(NoConstraintToggle),
    }
}

/// `PRAGMA defer_foreign_keys`: violations are checked at commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDeferral;

impl ConstraintToggle for SqliteDeferral {
    fn defer_constraints(&self, store: &dyn Store) -> StoreResult<()> {
        debug!("Deferring foreign keys");
        store.execute("PRAGMA defer_foreign_keys = ON", &[])?;
        Ok(())
    }

    fn restore_constraints(&self, store: &dyn Store) -> StoreResult<()> {
        debug!("Restoring foreign keys");
        store.execute("PRAGMA defer_foreign_keys = OFF", &[])?;
        Ok(())
    }
}

/// `SET CONSTRAINTS ALL DEFERRED`, for constraints declared deferrable.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDeferral;

impl ConstraintToggle for PostgresDeferral {
    fn defer_constraints(&self, store: &dyn Store) -> StoreResult<()> {
        debug!("Deferring constraints");
        store.execute("SET CONSTRAINTS ALL DEFERRED", &[])?;
        Ok(())
    }

    fn restore_constraints(&self, store: &dyn Store) -> StoreResult<()> {
        debug!("Restoring constraints");
        store.execute("SET CONSTRAINTS ALL IMMEDIATE", &[])?;
        Ok(())
    }
}

/// `SET foreign_key_checks`: checking is switched off, not deferred.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlForeignKeyChecks;

impl ConstraintToggle for MysqlForeignKeyChecks {
    fn defer_constraints(&self, store: &dyn Store) -> StoreResult<()> {
        debug!("Disabling foreign key checks");
        store.execute("SET foreign_key_checks = 0", &[])?;
        Ok(())
    }

    fn restore_constraints(&self, store: &dyn Store) -> StoreResult<()> {
        debug!("Enabling foreign key checks");
        store.execute("SET foreign_key_checks = 1", &[])?;
        Ok(())
    }
}

/// For backends without any toggle.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstraintToggle;

impl ConstraintToggle for NoConstraintToggle {
    fn defer_constraints(&self, _store: &dyn Store) -> StoreResult<()> {
        Ok(())
    }

    fn restore_constraints(&self, _store: &dyn Store) -> StoreResult<()> {
        Ok(())
    }
}
