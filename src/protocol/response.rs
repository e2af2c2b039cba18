//! Response bodies
//!
//! Handlers build a tree of key/value pairs; rendering flattens it depth-first
//! into `Key: value` lines.

use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Pair(String, String),
    Text(String),
    Group(Vec<Item>),
}

impl Item {
    pub fn pair(key: impl Into<String>, value: impl Display) -> Self {
        Item::Pair(key.into(), value.to_string())
    }

    fn render_into(self, lines: &mut Vec<String>) {
        match self {
            Item::Pair(key, value) => lines.push(format!("{}: {}", key, value)),
            Item::Text(text) => lines.push(text),
            Item::Group(items) => {
                for item in items {
                    item.render_into(lines);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    items: Vec<Item>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pair(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.push_pair(key, value);
        self
    }

    pub fn push_pair(&mut self, key: impl Into<String>, value: impl Display) {
        self.items.push(Item::pair(key, value));
    }

    pub fn push_group(&mut self, items: Vec<Item>) {
        self.items.push(Item::Group(items));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_lines(self) -> Vec<String> {
        let mut lines = Vec::new();
        for item in self.items {
            item.render_into(&mut lines);
        }
        lines
    }
}

impl From<Vec<Item>> for Response {
    fn from(items: Vec<Item>) -> Self {
        Self { items }
    }
}

impl FromIterator<Item> for Response {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
