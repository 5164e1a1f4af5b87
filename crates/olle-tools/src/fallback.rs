// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Deterministic fallback tool plans.
//!
//! When the model cannot be talked into a parseable plan, the planner
//! substitutes one of these templates, keyed on keyword detection in the
//! user request.  They are intentionally small: enough scaffolding to give
//! the user something runnable rather than an error.

use regex::Regex;
use serde_json::json;

use crate::ToolSpec;

/// Build a fallback plan for `request`.
pub fn fallback_tools(request: &str) -> Vec<ToolSpec> {
    let lower = request.to_lowercase();

    if contains_any(&lower, &["node", "javascript", "express", "npm"]) {
        return node_template();
    }
    if contains_any(&lower, &["python", "flask", "django", "pip"]) {
        return python_template();
    }
    if contains_any(&lower, &["ruby", "gem", "rails"]) {
        return ruby_template();
    }
    if contains_any(&lower, &["perl"]) {
        return perl_template();
    }
    if contains_any(&lower, &["arduino", "sketch", "esp32"]) {
        return arduino_template();
    }
    generic_file_template(request)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn node_template() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "create_file",
            json!({
                "path": "package.json",
                "content": "{\n  \"name\": \"app\",\n  \"version\": \"1.0.0\",\n  \"main\": \"index.js\",\n  \"scripts\": { \"start\": \"node index.js\" }\n}\n",
            }),
        ),
        ToolSpec::new(
            "create_file",
            json!({
                "path": "index.js",
                "content": "console.log('hello from node');\n",
            }),
        ),
        ToolSpec::new("run_terminal", json!({ "command": "npm install" })),
    ]
}

fn python_template() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "create_file",
            json!({ "path": "main.py", "content": "print('hello from python')\n" }),
        ),
        ToolSpec::new("create_file", json!({ "path": "requirements.txt", "content": "" })),
    ]
}

fn ruby_template() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "create_file",
            json!({ "path": "main.rb", "content": "puts 'hello from ruby'\n" }),
        ),
        ToolSpec::new(
            "create_file",
            json!({ "path": "Gemfile", "content": "source 'https://rubygems.org'\n" }),
        ),
    ]
}

fn perl_template() -> Vec<ToolSpec> {
    vec![ToolSpec::new(
        "create_file",
        json!({
            "path": "main.pl",
            "content": "#!/usr/bin/perl\nuse strict;\nuse warnings;\nprint \"hello from perl\\n\";\n",
        }),
    )]
}

fn arduino_template() -> Vec<ToolSpec> {
    vec![ToolSpec::new(
        "create_file",
        json!({
            "path": "sketch/sketch.ino",
            "content": "void setup() {\n}\n\nvoid loop() {\n}\n",
        }),
    )]
}

/// Last resort: create the file the request appears to name, or a scratch
/// file when no name is recognizable.
fn generic_file_template(request: &str) -> Vec<ToolSpec> {
    let name_pattern =
        Regex::new(r"([\w-]+(?:/[\w-]+)*\.[A-Za-z0-9]{1,8})").expect("static pattern is valid");
    let path = name_pattern
        .captures(request)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "notes.txt".to_string());
    vec![ToolSpec::new(
        "create_file",
        json!({ "path": path, "content": "" }),
    )]
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
