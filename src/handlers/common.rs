use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters shared by list endpoints.
#[derive(Debug, Deserialize, IntoParams)]
pub struct PaginationParams {
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    20
}

impl PaginationParams {
    /// Clamp to a sane page size.
    pub fn effective_limit(&self) -> u64 {
        self.limit.clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(PaginationParams { limit: 0 }.effective_limit(), 1);
        assert_eq!(PaginationParams { limit: 20 }.effective_limit(), 20);
        assert_eq!(PaginationParams { limit: 5000 }.effective_limit(), 100);
    }
}
