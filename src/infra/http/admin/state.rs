use std::sync::Arc;

use crate::application::admin::{AdminRolloutService, AdminToggleService};
use crate::application::repos::TogglesRepo;
use crate::application::resolver::Resolver;

#[derive(Clone)]
pub struct AdminState {
    pub toggles: Arc<AdminToggleService>,
    pub rollouts: Arc<AdminRolloutService>,
    pub resolver: Arc<Resolver>,
    pub source: Arc<dyn TogglesRepo>,
}
