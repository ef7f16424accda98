//! Evaluating code against a live object.
//!
//! The code is compiled as a category (Objective-C) or extension (Swift)
//! appended to the class's own source, injected, and then removed again.

use std::path::Path;

use injector_logminer::fill_template;
use percent_encoding::percent_decode_str;
use regex_lite::{NoExpand, Regex};

use super::{InjectionError, InjectionResult};

/// Marks the start of an eval addition in a source file.
pub const ADDITIONS_TAG: &str = "// added by Injector eval //";

/// A decoded `pathID^className^isSwift^code` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalRequest {
    pub path_id: String,
    pub class_name: String,
    pub is_swift: bool,
    pub code: String,
}

impl EvalRequest {
    pub fn parse(encoded: &str) -> InjectionResult<Self> {
        let malformed = || InjectionError::MalformedEval(encoded.to_string());
        let mut parts = encoded.splitn(4, '^');
        let (Some(path_id), Some(class_name), Some(is_swift), Some(code)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let is_swift = is_swift.trim().parse::<i64>().map_err(|_| malformed())? != 0;
        let code = percent_decode_str(code)
            .decode_utf8()
            .map_err(|_| malformed())?
            .into_owned();

        Ok(Self {
            path_id: path_id.to_string(),
            class_name: class_name.to_string(),
            is_swift,
            code,
        })
    }

    /// `Class.swift` or `Class.m`, looked up by bare name in the logs.
    pub fn source_file(&self) -> String {
        let ext = if self.is_swift { "swift" } else { "m" };
        format!("{}.{}", strip_module_prefix(&self.class_name), ext)
    }
}

/// `Module.Class` → `Class`.
pub fn strip_module_prefix(class_name: &str) -> &str {
    match class_name.rfind('.') {
        Some(i) if i > 0 => &class_name[i + 1..],
        _ => class_name,
    }
}

/// Fill an eval template for `class_file` (`Foo.m`).
pub fn eval_addition(template: &str, interface_header: &Path, class_file: &str, code: &str) -> String {
    let class_name = class_file
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(class_file);
    let header = interface_header.display().to_string();
    fill_template(
        template,
        &[
            ("__INTERFACE_HEADER__", header.as_str()),
            ("__ADDITIONS_TAG__", ADDITIONS_TAG),
            ("__CLASS_NAME__", class_name),
            ("__CODE__", code),
        ],
    )
}

fn existing_addition() -> InjectionResult<Regex> {
    let pattern = format!(r"(?s)\n*({}.*|$)", regex_lite::escape(ADDITIONS_TAG));
    Ok(Regex::new(&pattern)?)
}

/// Append `addition` to `source`, replacing any earlier one.
pub fn apply_eval_patch(source: &str, addition: &str) -> InjectionResult<String> {
    Ok(existing_addition()?
        .replace(source, NoExpand(addition))
        .into_owned())
}

/// Remove an eval addition.
pub fn revert_eval_patch(source: &str) -> InjectionResult<String> {
    Ok(existing_addition()?.replace(source, NoExpand("\n")).into_owned())
}
