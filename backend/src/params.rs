use crate::config::AppConfig;
use serde::Deserialize;

/// `?page=&per_page=` as sent by clients. Unparseable values fall back to
/// the defaults instead of rejecting the request.
#[derive(Deserialize, Debug, Default)]
pub struct PaginationParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl PaginationParams {
    pub fn resolve(&self, config: &AppConfig) -> Pagination {
        let page = self
            .page
            .as_ref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(1)
            .max(1);
        let max = i64::from(config.max_per_page.max(1));
        let per_page = self
            .per_page
            .as_ref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(i64::from(config.per_page))
            .clamp(1, max);
        Pagination { page, per_page }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self, total: i64) -> bool {
        self.page.saturating_mul(self.per_page) < total
    }

    /// Links to the neighbouring pages of `path`, if they exist.
    pub fn links(&self, path: &str, total: i64) -> (Option<String>, Option<String>) {
        let link = |page: i64| format!("{path}?page={page}&per_page={}", self.per_page);
        let prev = self.has_prev().then(|| link(self.page - 1));
        let next = self.has_next(total).then(|| link(self.page + 1));
        (prev, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, per_page: Option<&str>) -> PaginationParams {
        PaginationParams {
            page: page.map(str::to_string),
            per_page: per_page.map(str::to_string),
        }
    }

    #[test]
    fn defaults_come_from_config() {
        let p = params(None, None).resolve(&AppConfig::default());
        assert_eq!(p, Pagination { page: 1, per_page: 5 });
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn garbage_and_out_of_range_values_are_clamped() {
        let config = AppConfig::default();
        assert_eq!(params(Some("abc"), Some("xyz")).resolve(&config).page, 1);
        assert_eq!(params(Some("-3"), None).resolve(&config).page, 1);
        assert_eq!(params(None, Some("0")).resolve(&config).per_page, 1);
        assert_eq!(params(None, Some("100000")).resolve(&config).per_page, 100);
    }

    #[test]
    fn offset_skips_previous_pages() {
        let p = params(Some("3"), Some("10")).resolve(&AppConfig::default());
        assert_eq!(p.offset(), 20);
        assert_eq!(p.limit(), 10);
    }

    #[test]
    fn links_only_where_pages_exist() {
        let p = Pagination { page: 1, per_page: 5 };
        assert_eq!(
            p.links("/api/v1.0/posts/", 12),
            (None, Some("/api/v1.0/posts/?page=2&per_page=5".to_string()))
        );

        let p = Pagination { page: 3, per_page: 5 };
        assert_eq!(
            p.links("/api/v1.0/posts/", 12),
            (Some("/api/v1.0/posts/?page=2&per_page=5".to_string()), None)
        );

        let p = Pagination { page: 1, per_page: 5 };
        assert_eq!(p.links("/api/v1.0/posts/", 5), (None, None));
    }
}
