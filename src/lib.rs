//! # hclparse - HCL syntax tree dumper
//!
//! hclparse renders the syntax tree of an [HCL](https://github.com/hashicorp/hcl)
//! document, expression or template as an indented, parenthesized dump, one
//! line per node. It is a debugging aid for grammar work and for tools that
//! consume HCL syntax trees: the dump shows exactly how an input was structured.
//!
//! Parsing uses [tree-sitter](https://tree-sitter.github.io/tree-sitter/) with
//! the [tree-sitter-hcl](https://github.com/tree-sitter-grammars/tree-sitter-hcl)
//! grammar. The concrete tree is lowered into a tree shaped like HCL's native
//! syntax AST before printing.
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```rust
//! use hclparse::parser::parse_config;
//! use hclparse::printer::render_to_string;
//!
//! let parsed = parse_config("region = \"eu-west-1\"\n", "main.tf").unwrap();
//! let dump = render_to_string(&parsed.root, &parsed.source);
//! assert_eq!(
//!     dump,
//!     "(Body\n  (Attribute \"region\"\n    (LiteralValueExpr \"eu-west-1\")\n  )\n)\n"
//! );
//! ```
//!
//! ### As a CLI Tool
//!
//! ```text
//! hclparse -f main.tf
//! hclparse -e 'var.count * 2'
//! hclparse -t 'Hello, ${name}!'
//! ```
//!
//! ## Modules
//!
//! - [`syntax`] - The syntax tree and operator table
//! - [`walk`] - Depth-first traversal
//! - [`printer`] - The tree dump
//! - [`parser`] - Tree-sitter front door
//! - [`diagnostics`] - Syntax error reporting

/// Syntax error positions and reporting
pub mod diagnostics;

mod lower;

/// Tree-sitter based parsing of documents, expressions and templates
pub mod parser;

/// Indented dump of a syntax tree
pub mod printer;

/// HCL native syntax tree and operator table
pub mod syntax;

/// Depth-first traversal with enter and exit callbacks
pub mod walk;
