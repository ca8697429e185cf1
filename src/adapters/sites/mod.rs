//! Compiled-in site adapters, one module per retailer.

pub mod ammo_lake;
pub mod brass_house;

use std::sync::Arc;

use super::SiteAdapter;

/// Every adapter shipped with this build, in registration order.
pub fn all() -> Vec<Arc<dyn SiteAdapter>> {
    vec![
        Arc::new(brass_house::BrassHouseAdapter::new()),
        Arc::new(ammo_lake::AmmoLakeAdapter::new()),
    ]
}
