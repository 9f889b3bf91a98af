use std::fmt;

/// Error raised while tokenizing a template. Always fatal: no token stream
/// is produced on failure.
#[derive(Debug, Clone)]
pub struct LexError {
    raw_message: String,
    line: usize,
    name: Option<String>,
}

impl LexError {
    pub fn new(message: impl Into<String>, line: usize, name: Option<&str>) -> Self {
        Self {
            raw_message: message.into(),
            line,
            name: name.map(str::to_string),
        }
    }

    pub fn raw_message(&self) -> &str {
        &self.raw_message
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn template_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = format_message(&self.raw_message, self.name.as_deref(), Some(self.line));
        write!(f, "{}", repr)
    }
}

impl std::error::Error for LexError {}

/// Error raised while parsing a template. The template name and line are
/// best-effort: the parser fills them in at the parse boundary when the
/// raising site left them unset.
#[derive(Debug, Clone)]
pub struct SyntaxError {
    raw_message: String,
    line: Option<usize>,
    name: Option<String>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: Option<usize>, name: Option<&str>) -> Self {
        Self {
            raw_message: message.into(),
            line,
            name: name.map(str::to_string),
        }
    }

    pub fn raw_message(&self) -> &str {
        &self.raw_message
    }

    pub fn line(&self) -> Option<usize> {
        self.line
    }

    pub fn template_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_template_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    pub fn set_template_line(&mut self, line: usize) {
        self.line = Some(line);
    }

    pub fn append_message(&mut self, message: &str) {
        self.raw_message.push_str(message);
    }

    /// Append a "did you mean" clause when any candidate is close enough to
    /// the unknown name. No clause is added when nothing matches.
    pub fn add_suggestions(&mut self, name: &str, candidates: &[String]) {
        let alternatives = compute_alternatives(name, candidates);
        if alternatives.is_empty() {
            return;
        }
        self.append_message(&format!(" Did you mean \"{}\"?", alternatives.join("\", \"")));
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = format_message(&self.raw_message, self.name.as_deref(), self.line);
        write!(f, "{}", repr)
    }
}

impl std::error::Error for SyntaxError {}

/// Error during compilation: lexing or parsing
#[derive(Debug)]
pub enum CompileError {
    Lex(LexError),
    Syntax(SyntaxError),
}

impl From<LexError> for CompileError {
    fn from(err: LexError) -> Self {
        CompileError::Lex(err)
    }
}

impl From<SyntaxError> for CompileError {
    fn from(err: SyntaxError) -> Self {
        CompileError::Syntax(err)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(err) => write!(f, "{}", err),
            CompileError::Syntax(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CompileError {}

/// Build the display form: the raw message followed by ` in "name"` and
/// ` at line N`. A trailing `.` or `?` on the raw message is relocated after
/// the location, so suggestions read `… Did you mean "x" in "tpl" at line 2?`.
fn format_message(raw: &str, name: Option<&str>, line: Option<usize>) -> String {
    let mut message = raw.to_string();

    let dot = message.ends_with('.');
    if dot {
        message.pop();
    }

    let question_mark = message.ends_with('?');
    if question_mark {
        message.pop();
    }

    if let Some(name) = name {
        message.push_str(&format!(" in \"{}\"", name));
    }

    if let Some(line) = line {
        if line > 0 {
            message.push_str(&format!(" at line {}", line));
        }
    }

    if dot {
        message.push('.');
    }

    if question_mark {
        message.push('?');
    }

    message
}

/// Candidates within a third of the name's length in edit distance, or
/// containing the name as a substring, closest first.
pub(crate) fn compute_alternatives(name: &str, candidates: &[String]) -> Vec<String> {
    let mut alternatives: Vec<(usize, &String)> = Vec::new();
    for candidate in candidates {
        let lev = levenshtein(name, candidate);
        if lev <= name.len() / 3 || candidate.contains(name) {
            alternatives.push((lev, candidate));
        }
    }

    alternatives.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    alternatives.into_iter().map(|(_, c)| c.clone()).collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            row[j + 1] = (prev[j + 1] + 1).min(row[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut row);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_dot_is_relocated() {
        let err = SyntaxError::new("Unknown \"cycl\" function.", Some(2), Some("index"));
        assert_eq!(err.to_string(), "Unknown \"cycl\" function in \"index\" at line 2.");
    }

    #[test]
    fn trailing_question_mark_is_relocated() {
        let mut err = SyntaxError::new("Unknown \"cycl\" function.", Some(2), Some("index"));
        err.add_suggestions("cycl", &["cycle".to_string()]);
        assert_eq!(
            err.to_string(),
            "Unknown \"cycl\" function. Did you mean \"cycle\" in \"index\" at line 2?"
        );
    }

    #[test]
    fn no_suggestion_for_distant_names() {
        let mut err = SyntaxError::new("Unknown \"foobar\" function.", None, None);
        err.add_suggestions("foobar", &["cycle".to_string(), "range".to_string()]);
        assert_eq!(err.to_string(), "Unknown \"foobar\" function.");
    }

    #[test]
    fn substring_counts_as_alternative() {
        let alts = compute_alternatives("date", &["date_modify".to_string(), "json".to_string()]);
        assert_eq!(alts, vec!["date_modify".to_string()]);
    }
}
