use crate::finder::FacilityFinder;
use std::sync::Arc;

pub struct AppState {
    pub finder: Arc<FacilityFinder>,
}
