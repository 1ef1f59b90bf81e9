use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding the crate's own sources. Anything else in the checkout,
// such as reference material or build output, is never scanned.
const SOURCE_ROOTS: [&str; 5] = ["studies", "learn", "cli", "tests", "benches"];

const FORBIDDEN_WORDS: [&str; 14] = [
    "FIXED",
    "CORRECTED",
    "FIX",
    "FIXES",
    "NEW",
    "CHANGED",
    "CHANGES",
    "CHANGE",
    "MODIFIED",
    "MODIFIES",
    "MODIFY",
    "UPDATED",
    "UPDATES",
    "UPDATE",
];

#[derive(Clone, Copy)]
enum Rule {
    UnderscorePrefix,
    ForbiddenWord,
    StarsInComment,
    AllCapsComment,
    AllowDeadCode,
}

impl Rule {
    fn pattern(self) -> String {
        match self {
            Rule::UnderscorePrefix => r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            Rule::ForbiddenWord => format!(r"(//|/\*).*(?:{})", FORBIDDEN_WORDS.join("|")),
            Rule::StarsInComment => r"(//|/\*).*\*\*".to_string(),
            Rule::AllCapsComment => r"(//|/\*).*".to_string(),
            Rule::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
        }
    }

    fn explanation(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => {
                "Underscore-prefixed names are not allowed. Either use the binding or remove it."
            }
            Rule::ForbiddenWord => {
                "Comments narrating edits (FIXED, NEW, CHANGED, UPDATED, ...) are not allowed. Remove them."
            }
            Rule::StarsInComment => "The '**' pattern is only allowed in doc comments.",
            Rule::AllCapsComment => "Comments written entirely in uppercase are not allowed.",
            Rule::AllowDeadCode => {
                "#[allow(dead_code)] is not allowed. Either use the code or remove it."
            }
        }
    }

    fn comment_text(line: &str) -> Option<&str> {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("///") {
            return Some(rest.trim());
        }
        if let Some(rest) = trimmed.strip_prefix("//") {
            return Some(rest.trim());
        }
        let start = line.find("/*")? + 2;
        Some(match line[start..].find("*/") {
            Some(end) => line[start..start + end].trim(),
            None => line[start..].trim(),
        })
    }

    fn is_violation(self, line: &str) -> bool {
        match self {
            Rule::UnderscorePrefix => {
                let in_comment = line.trim_start().starts_with("//") || line.contains("/*");
                // Text between quote pairs is string content, not code.
                let in_string = line
                    .split('"')
                    .enumerate()
                    .any(|(i, part)| i % 2 == 1 && part.contains('_'));
                !in_comment && !in_string
            }
            Rule::ForbiddenWord | Rule::AllowDeadCode => true,
            Rule::StarsInComment => !line.trim_start().starts_with("///"),
            Rule::AllCapsComment => Rule::comment_text(line).is_some_and(|text| {
                let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
                letters.peek().is_some() && letters.all(|c| c.is_uppercase())
            }),
        }
    }
}

struct RuleCollector {
    rule: Rule,
    file_path: PathBuf,
    violations: Vec<String>,
}

impl RuleCollector {
    fn new(rule: Rule, file_path: &Path) -> Self {
        Self {
            rule,
            file_path: file_path.to_path_buf(),
            violations: Vec::new(),
        }
    }

    fn error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }
        let mut message = format!(
            "\n❌ ERROR: Found {} violations in {}:\n",
            self.violations.len(),
            self.file_path.display()
        );
        for violation in &self.violations {
            message.push_str(&format!("   {violation}\n"));
        }
        message.push_str(&format!("\n⚠️ {}\n", self.rule.explanation()));
        Some(message)
    }
}

impl Sink for RuleCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if self.rule.is_violation(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn source_files() -> Vec<PathBuf> {
    SOURCE_ROOTS
        .iter()
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn scan(rule: Rule, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(&rule.pattern())?;
    let mut searcher = Searcher::new();
    for path in files {
        let mut collector = RuleCollector::new(rule, path);
        searcher.search_path(&matcher, path, &mut collector)?;
        if let Some(message) = collector.error_message() {
            return Err(message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    let files = source_files();
    for rule in [
        Rule::UnderscorePrefix,
        Rule::ForbiddenWord,
        Rule::StarsInComment,
        Rule::AllCapsComment,
        Rule::AllowDeadCode,
    ] {
        if let Err(e) = scan(rule, &files) {
            // Printed before exiting so cargo shows the offending lines.
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
