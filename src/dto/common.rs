use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

/// Page size of a plain listing.
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitParams {
    /// Maximum number of entries returned.
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}
