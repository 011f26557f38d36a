use serde::{Deserialize, Serialize};

/// User-declared spending category; categories nest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub children: Vec<Category>,
}

impl Category {
    pub fn new(name: &str) -> Self {
        Category {
            name: name.to_string(),
            emoji: None,
            children: Vec::new(),
        }
    }

    pub fn with_emoji(mut self, emoji: &str) -> Self {
        self.emoji = Some(emoji.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<Category>) -> Self {
        self.children = children;
        self
    }

    /// Depth-first search through this category and its descendants.
    pub fn find(&self, name: &str) -> Option<&Category> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Every name in the subtree, parents before children.
    pub fn names(&self) -> Vec<&str> {
        let mut out = vec![self.name.as_str()];
        for child in &self.children {
            out.extend(child.names());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Category {
        Category::new("Living").with_children(vec![
            Category::new("Food")
                .with_emoji("🍝")
                .with_children(vec![Category::new("Groceries")]),
            Category::new("Rent"),
        ])
    }

    #[test]
    fn find_searches_nested_children() {
        let t = tree();
        assert_eq!(t.find("Groceries").map(|c| c.name.as_str()), Some("Groceries"));
        assert_eq!(t.find("Food").and_then(|c| c.emoji.as_deref()), Some("🍝"));
        assert!(t.find("Travel").is_none());
    }

    #[test]
    fn names_are_depth_first() {
        assert_eq!(tree().names(), vec!["Living", "Food", "Groceries", "Rent"]);
    }

    #[test]
    fn deserializes_with_defaults() {
        let c: Category = serde_json::from_str(r#"{"name": "Travel"}"#).unwrap();
        assert!(c.children.is_empty());
        assert!(c.emoji.is_none());
    }
}
