//! Fix expression tree.
//!
//! A fix is stored as JSON. Either form is accepted:
//!
//! ```json
//! {"expressions": [{"type": "call", "name": "upcase", "params": ["title"]}]}
//! [{"type": "call", "name": "upcase", "params": ["title"]}]
//! ```

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::FixResult;

/// Named options of a call or bind.
pub type Options = IndexMap<String, String>;

/// One node of a fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expression {
    /// Method call.
    Call {
        name: String,
        #[serde(default)]
        params: Vec<String>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        options: Options,
    },

    /// `if` / `elsif` / `else`.
    If {
        name: String,
        #[serde(default)]
        params: Vec<String>,
        #[serde(default)]
        elements: Vec<Expression>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        elsif: Vec<ElsIf>,
        #[serde(default, rename = "else", skip_serializing_if = "Option::is_none")]
        otherwise: Option<Vec<Expression>>,
    },

    /// `unless`.
    Unless {
        name: String,
        #[serde(default)]
        params: Vec<String>,
        #[serde(default)]
        elements: Vec<Expression>,
    },

    /// Bound block, e.g. `do list(path: "a", var: "$i")`.
    Do {
        name: String,
        #[serde(default)]
        params: Vec<String>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        options: Options,
        #[serde(default)]
        elements: Vec<Expression>,
    },
}

/// An `elsif` branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElsIf {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub elements: Vec<Expression>,
}

fn strings<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Vec<String> {
    items.into_iter().map(Into::into).collect()
}

impl Expression {
    pub fn call<S: Into<String>>(name: &str, params: impl IntoIterator<Item = S>) -> Self {
        Expression::Call {
            name: name.to_string(),
            params: strings(params),
            options: Options::new(),
        }
    }

    pub fn when<S: Into<String>>(
        name: &str,
        params: impl IntoIterator<Item = S>,
        elements: Vec<Expression>,
    ) -> Self {
        Expression::If {
            name: name.to_string(),
            params: strings(params),
            elements,
            elsif: Vec::new(),
            otherwise: None,
        }
    }

    pub fn unless<S: Into<String>>(
        name: &str,
        params: impl IntoIterator<Item = S>,
        elements: Vec<Expression>,
    ) -> Self {
        Expression::Unless {
            name: name.to_string(),
            params: strings(params),
            elements,
        }
    }

    pub fn bind(name: &str, elements: Vec<Expression>) -> Self {
        Expression::Do {
            name: name.to_string(),
            params: Vec::new(),
            options: Options::new(),
            elements,
        }
    }

    /// Add a named option to a call or bind. Other kinds are returned as is.
    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        if let Expression::Call { options, .. } | Expression::Do { options, .. } = &mut self {
            options.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Add an `elsif` branch to an `if`.
    pub fn elsif<S: Into<String>>(
        mut self,
        name: &str,
        params: impl IntoIterator<Item = S>,
        elements: Vec<Expression>,
    ) -> Self {
        if let Expression::If { elsif, .. } = &mut self {
            elsif.push(ElsIf {
                name: name.to_string(),
                params: strings(params),
                elements,
            });
        }
        self
    }

    /// Set the `else` branch of an `if`.
    pub fn otherwise(mut self, elements: Vec<Expression>) -> Self {
        if let Expression::If { otherwise, .. } = &mut self {
            *otherwise = Some(elements);
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Expression::Call { name, .. }
            | Expression::If { name, .. }
            | Expression::Unless { name, .. }
            | Expression::Do { name, .. } => name,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FixDocument {
    Wrapped { expressions: Vec<Expression> },
    Bare(Vec<Expression>),
}

/// A parsed fix: expressions run in order against every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Fix {
    pub expressions: Vec<Expression>,
}

impl Fix {
    pub fn new(expressions: Vec<Expression>) -> Self {
        Self { expressions }
    }

    /// Parse a fix from JSON.
    pub fn from_json(json: &str) -> FixResult<Self> {
        let expressions = match serde_json::from_str::<FixDocument>(json)? {
            FixDocument::Wrapped { expressions } | FixDocument::Bare(expressions) => expressions,
        };
        Ok(Self { expressions })
    }

    /// Load a fix from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> FixResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> FixResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// A small catalog cleanup fix showing every expression kind.
    pub fn example() -> Self {
        Self::new(vec![
            Expression::call("move_field", ["author", "creator.name"]),
            Expression::call::<&str>("trim", ["title"]),
            Expression::call("split_field", ["subjects", ";"]),
            Expression::call("lookup", ["language"])
                .with_option("en", "English")
                .with_option("fr", "French")
                .with_option("__default", "Unknown"),
            Expression::when(
                "any_match",
                ["year", "1[0-9]{3}"],
                vec![Expression::call("add_field", ["era", "historic"])],
            )
            .elsif("exists", ["year"], vec![Expression::call("add_field", ["era", "modern"])])
            .otherwise(vec![Expression::call("add_field", ["era", "unknown"])]),
            Expression::bind(
                "list",
                vec![Expression::call::<&str>("capitalize", ["$i"])],
            )
            .with_option("path", "subjects")
            .with_option("var", "$i"),
            Expression::unless("exists", ["title"], vec![Expression::call::<&str>("reject", [])]),
            Expression::call::<&str>("vacuum", []),
        ])
    }
}
