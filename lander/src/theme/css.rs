//! Code for minifying theme stylesheets.

use anyhow::{Context, Result};
use lightningcss::{
    error::Error,
    printer::PrinterOptions,
    stylesheet::{MinifyOptions, ParserFlags, ParserOptions, StyleSheet},
    targets::{Browsers, Features, Targets},
};
use std::collections::HashSet;

/// Parses the input string as CSS and minifies it for a set of "reasonable" target browser versions.
///
/// # Errors
/// This function returns an error if:
/// - the input string cannot be successfully parsed as CSS
/// - parsed stylesheet cannot be minified for the target browser versions
/// - minified stylesheet cannot be serialized to a string
///
/// # Panics
/// This function panics if:
/// - querying for the default set of target browser versions returns an error
/// - the default set of target browser versions does not exist
pub(crate) fn minify_css(source: &str, filename: &str) -> Result<String> {
    let mut stylesheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: filename.to_owned(),
            css_modules: None,
            source_index: 0,
            // The CSS parser should error instead of reporting success while emitting warnings
            error_recovery: false,
            warnings: None,
            flags: ParserFlags::NESTING,
        },
    )
    .map_err(Error::into_owned)
    .with_context(|| format!("failed to parse {filename} as valid CSS"))?;

    let targets = Targets {
        browsers: Some(
            Browsers::from_browserslist(["defaults"])
                .expect("query for browserslist defaults should succeed")
                .expect("browser targets should exist"),
        ),
        include: Features::empty(),
        exclude: Features::empty(),
    };

    stylesheet
        .minify(MinifyOptions {
            targets,
            unused_symbols: HashSet::default(),
        })
        .with_context(|| format!("failed to minify {filename}"))?;

    let css = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            project_root: None,
            targets,
            analyze_dependencies: None,
            pseudo_classes: None,
        })
        .with_context(|| format!("failed to serialize minified {filename}"))?
        .code;

    Ok(css)
}
