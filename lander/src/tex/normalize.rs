//! Code for reading TeX source into one flat, comment-free string.

use crate::error::TexError;
use regex::Regex;
use std::{
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tracing::debug;

// An unescaped `%` through the end of its line; the preceding character is kept
static COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(^|[^\\])%.*$").expect("comment pattern should be valid")
});

static TRAILING_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)[ \t]+$").expect("trailing whitespace pattern should be valid")
});

// `\input{name}`, `\input name`, `\include{name}`, `\include name`; the terminator is consumed
static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:input|include)(?:[ ]*\{|[ ]+)([\w/\-.]+)[}%\s]")
        .expect("include pattern should be valid")
});

/// Removes every comment from TeX source. Escaped percent signs (`\%`) are kept.
#[must_use]
pub fn remove_comments(source: &str) -> String {
    COMMENT.replace_all(source, "${1}").into_owned()
}

/// Removes spaces and tabs at the end of every line, keeping the line breaks.
#[must_use]
pub fn remove_trailing_whitespace(source: &str) -> String {
    TRAILING_WHITESPACE.replace_all(source, "").into_owned()
}

/// Reads a root TeX file and normalizes it with [`normalize`].
/// Included files are resolved relative to the directory of `root_path`.
///
/// # Errors
/// This function returns an error if:
/// - the root file or any file it includes cannot be read
/// - a file includes itself, directly or through other files
pub fn read_tex_file(root_path: &Path) -> Result<String, TexError> {
    let root_dir = root_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    read_tex_file_in(root_path, root_dir)
}

/// Reads a TeX file and normalizes it, resolving included files relative to `root_dir`.
///
/// # Errors
/// See [`read_tex_file`].
pub fn read_tex_file_in(path: &Path, root_dir: &Path) -> Result<String, TexError> {
    read_with_chain(path, root_dir, &mut Vec::new())
}

/// Normalizes in-memory TeX source:
/// comments and trailing whitespace are removed,
/// then `\input` and `\include` commands are replaced by the normalized content of the files they name.
/// File names without a `.tex` extension have one added, and every file is resolved against `root_dir`.
///
/// The result is unchanged by normalizing it again.
///
/// # Errors
/// See [`read_tex_file`].
pub fn normalize(source: &str, root_dir: &Path) -> Result<String, TexError> {
    normalize_with_chain(source, root_dir, &mut Vec::new())
}

// `chain` holds the canonical paths of the files currently being inlined
fn read_with_chain(
    path: &Path,
    root_dir: &Path,
    chain: &mut Vec<PathBuf>,
) -> Result<String, TexError> {
    let source = read_to_string(path).map_err(|source| {
        let path = path.to_path_buf();
        if source.kind() == ErrorKind::InvalidData {
            TexError::NotUtf8 { path, source }
        } else {
            TexError::SourceNotFound { path, source }
        }
    })?;

    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if chain.contains(&canonical) {
        return Err(TexError::IncludeCycle {
            path: path.to_path_buf(),
        });
    }

    debug!("Reading TeX source from {path:?}");
    chain.push(canonical);
    let normalized = normalize_with_chain(&source, root_dir, chain);
    chain.pop();

    normalized
}

fn normalize_with_chain(
    source: &str,
    root_dir: &Path,
    chain: &mut Vec<PathBuf>,
) -> Result<String, TexError> {
    let source = remove_trailing_whitespace(&remove_comments(source));

    let mut output = String::with_capacity(source.len());
    let mut last_end = 0;

    for captures in INCLUDE.captures_iter(&source) {
        let invocation = captures.get(0).expect("whole match should always be present");
        let included_path = resolve_include(root_dir, &captures[1]);

        output.push_str(&source[last_end..invocation.start()]);
        output.push_str(&read_with_chain(&included_path, root_dir, chain)?);
        last_end = invocation.end();
    }
    output.push_str(&source[last_end..]);

    Ok(output)
}

fn resolve_include(root_dir: &Path, name: &str) -> PathBuf {
    if Path::new(name).extension().is_some_and(|ext| ext == "tex") {
        root_dir.join(name)
    } else {
        root_dir.join(format!("{name}.tex"))
    }
}

#[cfg(test)]
mod test {
    use super::{normalize, read_tex_file, remove_comments, remove_trailing_whitespace};
    use crate::error::TexError;
    use pretty_assertions::assert_eq;
    use std::{
        fs::{create_dir, write},
        path::Path,
    };
    use tempfile::tempdir;

    #[test]
    fn comments() {
        assert_eq!(
            remove_comments("The uncertainty is 5\\%.  % a comment"),
            "The uncertainty is 5\\%.  "
        );
        assert_eq!(remove_comments("% whole line\nText"), "\nText");
        assert_eq!(remove_comments("a\\%%comment"), "a\\%");
        assert_eq!(remove_comments("a%b\nc%d"), "a\nc");
    }

    #[test]
    fn trailing_whitespace() {
        assert_eq!(
            remove_trailing_whitespace("First line.    \nSecond line. "),
            "First line.\nSecond line."
        );
        assert_eq!(remove_trailing_whitespace("\t\n  x\t \n"), "\n  x\n");
    }

    #[test]
    fn idempotent() {
        let dir = tempdir().expect("temporary directory should be created");
        write(dir.path().join("body.tex"), "Body text.   % comment\n")
            .expect("fixture should be written");

        let source = "\\documentclass{article}  \n% preamble comment\n\\input{body}\nEnd 5\\%.\n";
        let once = normalize(source, dir.path()).expect("normalization should succeed");
        let twice = normalize(&once, dir.path()).expect("normalization should succeed");

        assert_eq!(once, "\\documentclass{article}\n\nBody text.\n\nEnd 5\\%.\n");
        assert_eq!(twice, once);
    }

    #[test]
    fn include_forms() {
        let dir = tempdir().expect("temporary directory should be created");
        write(dir.path().join("a.tex"), "A").expect("fixture should be written");
        write(dir.path().join("b.tex"), "B").expect("fixture should be written");

        let normalized = normalize(
            "\\input{a}\n\\input{a.tex}\n\\include {b}\n\\input b\nend",
            dir.path(),
        )
        .expect("normalization should succeed");

        // The whitespace form consumes its terminating newline
        assert_eq!(normalized, "A\nA\nB\nBend");
    }

    #[test]
    fn include_lookalikes_are_kept() {
        let source = "\\includegraphics{figure}\n\\inputencoding{utf8}";
        let normalized =
            normalize(source, Path::new("/nonexistent")).expect("normalization should succeed");
        assert_eq!(normalized, source);
    }

    #[test]
    fn nested_includes_resolve_against_root() {
        let dir = tempdir().expect("temporary directory should be created");
        create_dir(dir.path().join("sections")).expect("fixture should be written");
        write(
            dir.path().join("main.tex"),
            "\\input{sections/intro}\n",
        )
        .expect("fixture should be written");
        write(
            dir.path().join("sections/intro.tex"),
            "Intro\n\\input{sections/detail}\n",
        )
        .expect("fixture should be written");
        write(dir.path().join("sections/detail.tex"), "Detail")
            .expect("fixture should be written");

        let normalized =
            read_tex_file(&dir.path().join("main.tex")).expect("normalization should succeed");
        assert_eq!(normalized, "Intro\nDetail\n\n");
    }

    #[test]
    fn abstract_from_second_file() {
        let dir = tempdir().expect("temporary directory should be created");
        write(
            dir.path().join("main.tex"),
            "\\documentclass{lsstdoc}\n\\input{abstract}\n\\begin{document}\n",
        )
        .expect("fixture should be written");
        write(dir.path().join("abstract.tex"), "\\setDocAbstract{Some text.}\n")
            .expect("fixture should be written");

        let normalized =
            read_tex_file(&dir.path().join("main.tex")).expect("normalization should succeed");
        assert!(normalized.contains("\\setDocAbstract{Some text.}"));
    }

    #[test]
    fn missing_include() {
        let dir = tempdir().expect("temporary directory should be created");
        let error = normalize("\\input{missing}\n", dir.path()).expect_err("include should fail");

        assert!(matches!(
            error,
            TexError::SourceNotFound { ref path, .. } if path.ends_with("missing.tex")
        ));
    }

    #[test]
    fn include_not_utf8() {
        let dir = tempdir().expect("temporary directory should be created");
        write(dir.path().join("latin1.tex"), b"caf\xe9\n").expect("fixture should be written");

        let error = normalize("\\input{latin1}\n", dir.path()).expect_err("include should fail");
        assert!(matches!(
            error,
            TexError::NotUtf8 { ref path, .. } if path.ends_with("latin1.tex")
        ));
    }

    #[test]
    fn include_cycle() {
        let dir = tempdir().expect("temporary directory should be created");
        write(dir.path().join("a.tex"), "\\input{b}\n").expect("fixture should be written");
        write(dir.path().join("b.tex"), "\\input{a}\n").expect("fixture should be written");

        let error = read_tex_file(&dir.path().join("a.tex")).expect_err("cycle should be detected");
        assert!(matches!(error, TexError::IncludeCycle { ref path } if path.ends_with("a.tex")));
    }

    #[test]
    fn self_include() {
        let dir = tempdir().expect("temporary directory should be created");
        write(dir.path().join("self.tex"), "x \\input self\n").expect("fixture should be written");

        assert!(matches!(
            read_tex_file(&dir.path().join("self.tex")),
            Err(TexError::IncludeCycle { .. })
        ));
    }
}
