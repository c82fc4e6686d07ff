use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use crate::model::{ClientVersion, SecondPartStatus, SecondPartVersion};

/// Paginación 1-based con normalización de valores fuera de rango.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    /// `page <= 0` → 1; `per_page <= 0` o `> 500` → 100.
    pub fn new(page: i64, per_page: i64) -> Self {
        let page = if page <= 0 { 1 } else { page };
        let per_page = if per_page <= 0 || per_page > MAX_PER_PAGE { DEFAULT_PER_PAGE } else { per_page };
        Self { page, per_page }
    }

    pub fn offset(&self) -> i64 { (self.page - 1) * self.per_page }
}

impl Default for PageRequest {
    fn default() -> Self { Self::new(1, DEFAULT_PER_PAGE) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientFilter {
    pub needs_second_part: Option<bool>,
    /// Estado de la segunda parte vigente; excluye clientes sin ella.
    pub sp_status: Option<SecondPartStatus>,
    /// `due_at <= due_before` de la segunda parte vigente.
    pub due_before: Option<DateTime<Utc>>,
}

impl ClientFilter {
    pub fn matches(&self, client: &ClientVersion, sp: Option<&SecondPartVersion>) -> bool {
        if let Some(flag) = self.needs_second_part {
            if client.needs_second_part != flag {
                return false;
            }
        }
        if let Some(status) = self.sp_status {
            if sp.map(|s| s.status) != Some(status) {
                return false;
            }
        }
        if let Some(limit) = self.due_before {
            match sp.and_then(|s| s.due_at) {
                Some(due) if due <= limit => {}
                _ => return false,
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientListItem {
    pub client: ClientVersion,
    pub second_part: Option<SecondPartVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFilter {
    pub user_id: Option<i64>,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_normalization() {
        assert_eq!(PageRequest::new(0, 0), PageRequest { page: 1, per_page: 100 });
        assert_eq!(PageRequest::new(-4, 501), PageRequest { page: 1, per_page: 100 });
        assert_eq!(PageRequest::new(3, 500), PageRequest { page: 3, per_page: 500 });
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }
}
