use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color regex"));

/// User-defined task category
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub category_id: i64,
    pub user_id: i64,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl CreateCategoryRequest {
    pub fn validate(self) -> Result<(String, Option<String>), String> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| "Category name is required".to_string())?;
        if name.chars().count() > 100 {
            return Err("Category name must be at most 100 characters".to_string());
        }
        let color = match self.color.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()) {
            Some(c) if HEX_COLOR.is_match(&c) => Some(c.to_lowercase()),
            Some(c) => return Err(format!("Color '{}' must look like #RRGGBB", c)),
            None => None,
        };
        Ok((name, color))
    }
}
