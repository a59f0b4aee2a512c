/*!
The `.rift` pattern-bundle façade.

A bundle names patterns with their flag lists and attaches test cases; the
core compiles each pattern and reports, per test case, the actual
match/no-match outcome and the actual group contents.

```text
# tokens.rift
pattern digits = /\d+/ [utf8]
pattern ssn    = r'\d{3}-\d{2}-\d{4}'

test digits "order 66"          => match ["66"]
test ssn    "SSN: 123-45-6789." => match
test digits "no numbers here"   => no-match
```

A raw-literal source form (`r'…'` or `r"…"`) implies the raw-literal flag.

```
use librift::{dsl, Config};

let bundle = dsl::parse_bundle(r#"
    pattern word = /([a-z]+)/
    test word "big words" => match ["big"]
"#).unwrap();
let reports = dsl::run_bundle(&bundle, &Config::default()).unwrap();
assert!(reports.iter().all(|r| r.passed));
```
*/

use logos::Logos;

use crate::{
    config::Config,
    error::{Error, Result},
    flags::Flags,
    regex::Regex,
};

#[derive(Logos, Clone, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip(r"#[^\n]*", allow_greedy = true))]
enum DslToken {
    #[token("pattern")]
    Pattern,

    #[token("test")]
    Test,

    #[token("=")]
    Equals,

    #[token("=>")]
    Arrow,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token(",")]
    Comma,

    #[token("match")]
    ExpectMatch,

    #[token("no-match")]
    ExpectNoMatch,

    /// Pattern or flag name.
    #[regex(r"[A-Za-z_][A-Za-z0-9_-]*")]
    Ident,

    /// `/…/` pattern source; `\/` escapes the delimiter.
    #[regex(r"/(\\.|[^/\\\n])*/")]
    SlashSource,

    /// Raw-literal pattern source, passed to the engine verbatim.
    #[regex(r"r'(\\.|[^'\\\n])*'")]
    #[regex(r#"r"(\\.|[^"\\\n])*""#)]
    RawSource,

    /// A double-quoted string with the usual escapes.
    #[regex(r#""(\\.|[^"\\\n])*""#)]
    Str,
}

/// A named pattern declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct BundlePattern {
    pub name: String,
    pub source: String,
    pub flags: Flags,
}

/// One test case against a named pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct BundleTest {
    pub pattern: String,
    pub input: String,
    pub expect_match: bool,
    /// Expected group contents, `["g1", "g2", …]`, when given.
    pub expected_groups: Option<Vec<String>>,
}

/// A parsed `.rift` bundle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bundle {
    pub patterns: Vec<BundlePattern>,
    pub tests: Vec<BundleTest>,
}

/// The outcome of one test case.
#[derive(Clone, Debug)]
pub struct TestReport {
    pub pattern: String,
    pub input: String,
    pub expect_match: bool,
    /// The actual outcome.
    pub matched: bool,
    /// Actual group contents of the match, `None` per non-participating
    /// group.
    pub groups: Vec<Option<String>>,
    pub passed: bool,
    /// A resource fault that aborted the attempt, if any; counted as
    /// no-match.
    pub error: Option<Error>,
}

/// Parses bundle text into patterns and test cases.
pub fn parse_bundle(text: &str) -> Result<Bundle> {
    let mut parser = BundleParser::new(text);
    let mut bundle = Bundle::default();
    while let Some(token) = parser.next()? {
        match token {
            DslToken::Pattern => bundle.patterns.push(parser.pattern_decl()?),
            DslToken::Test => bundle.tests.push(parser.test_decl()?),
            _ => return Err(parser.unexpected("`pattern` or `test`")),
        }
    }
    Ok(bundle)
}

/// Compiles every pattern and runs every test case, returning the actual
/// outcomes in order.
pub fn run_bundle(bundle: &Bundle, config: &Config) -> Result<Vec<TestReport>> {
    let mut compiled: Vec<(&str, Regex)> = Vec::with_capacity(bundle.patterns.len());
    for pattern in &bundle.patterns {
        let re = Regex::builder()
            .flags(pattern.flags)
            .config(config.clone())
            .build(&pattern.source)?;
        compiled.push((&pattern.name, re));
    }
    let mut reports = Vec::with_capacity(bundle.tests.len());
    for test in &bundle.tests {
        let Some((_, re)) = compiled.iter().find(|(name, _)| *name == test.pattern) else {
            return Err(Error::invalid_parameter("test references an unknown pattern"));
        };
        let (matched, groups, error) = match re.captures(&test.input) {
            Ok(Some(caps)) => {
                let groups = (1..=caps.group_count() as usize)
                    .map(|i| caps.get(i).map(|range| test.input[range].to_string()))
                    .collect();
                (true, groups, None)
            }
            Ok(None) => (false, Vec::new(), None),
            Err(error) => (false, Vec::new(), Some(error)),
        };
        let groups_pass = match &test.expected_groups {
            None => true,
            Some(expected) => {
                expected.len() == groups.len()
                    && expected
                        .iter()
                        .zip(&groups)
                        .all(|(want, got)| got.as_deref() == Some(want.as_str()))
            }
        };
        let passed = matched == test.expect_match && (!matched || groups_pass);
        reports.push(TestReport {
            pattern: test.pattern.clone(),
            input: test.input.clone(),
            expect_match: test.expect_match,
            matched,
            groups,
            passed,
            error,
        });
    }
    Ok(reports)
}

struct BundleParser<'s> {
    lexer: logos::Lexer<'s, DslToken>,
}

impl<'s> BundleParser<'s> {
    fn new(text: &'s str) -> BundleParser<'s> {
        BundleParser {
            lexer: DslToken::lexer(text),
        }
    }

    fn next(&mut self) -> Result<Option<DslToken>> {
        match self.lexer.next() {
            None => Ok(None),
            Some(Ok(token)) => Ok(Some(token)),
            Some(Err(())) => Err(Error::syntax(
                "unrecognized bundle syntax",
                self.lexer.span().start,
            )),
        }
    }

    fn expect(&mut self, want: DslToken, describe: &str) -> Result<()> {
        match self.next()? {
            Some(token) if token == want => Ok(()),
            _ => Err(self.unexpected(describe)),
        }
    }

    fn unexpected(&self, wanted: &str) -> Error {
        Error::syntax(
            &format!("expected {wanted}"),
            self.lexer.span().start,
        )
    }

    /// `pattern <name> = <source> [flags…]`; the keyword has been
    /// consumed.
    fn pattern_decl(&mut self) -> Result<BundlePattern> {
        match self.next()? {
            Some(DslToken::Ident) => {}
            _ => return Err(self.unexpected("a pattern name")),
        }
        let name = self.lexer.slice().to_string();
        self.expect(DslToken::Equals, "`=`")?;
        let (source, mut flags) = match self.next()? {
            Some(DslToken::SlashSource) => {
                let slice = self.lexer.slice();
                (
                    slice[1..slice.len() - 1].replace("\\/", "/"),
                    Flags::empty(),
                )
            }
            Some(DslToken::RawSource) => (self.lexer.slice().to_string(), Flags::RAW_LITERAL),
            _ => return Err(self.unexpected("a `/…/` or raw-literal pattern source")),
        };
        flags |= self.flag_list()?;
        Ok(BundlePattern { name, source, flags })
    }

    /// `test <name> "<input>" => match ["…", …] | no-match`; the keyword
    /// has been consumed.
    fn test_decl(&mut self) -> Result<BundleTest> {
        match self.next()? {
            Some(DslToken::Ident) => {}
            _ => return Err(self.unexpected("a pattern name")),
        }
        let pattern = self.lexer.slice().to_string();
        match self.next()? {
            Some(DslToken::Str) => {}
            _ => return Err(self.unexpected("a quoted input string")),
        }
        let input = unescape(self.lexer.slice());
        self.expect(DslToken::Arrow, "`=>`")?;
        match self.next()? {
            Some(DslToken::ExpectMatch) => {
                let expected_groups = self.optional_group_list()?;
                Ok(BundleTest {
                    pattern,
                    input,
                    expect_match: true,
                    expected_groups,
                })
            }
            Some(DslToken::ExpectNoMatch) => Ok(BundleTest {
                pattern,
                input,
                expect_match: false,
                expected_groups: None,
            }),
            _ => Err(self.unexpected("`match` or `no-match`")),
        }
    }

    /// `[name, name, …]`, empty when absent.
    fn flag_list(&mut self) -> Result<Flags> {
        let mut flags = Flags::empty();
        let mut peek = self.lexer.clone();
        match peek.next() {
            Some(Ok(DslToken::BracketOpen)) => self.lexer = peek,
            _ => return Ok(flags),
        }
        loop {
            match self.next()? {
                Some(DslToken::BracketClose) => return Ok(flags),
                Some(DslToken::Ident) => {
                    flags |= flag_by_name(self.lexer.slice()).ok_or_else(|| {
                        Error::syntax("unknown flag name", self.lexer.span().start)
                    })?;
                    match self.next()? {
                        Some(DslToken::Comma) => {}
                        Some(DslToken::BracketClose) => return Ok(flags),
                        _ => return Err(self.unexpected("`,` or `]`")),
                    }
                }
                _ => return Err(self.unexpected("a flag name or `]`")),
            }
        }
    }

    /// `["…", …]` after `match`, when present.
    fn optional_group_list(&mut self) -> Result<Option<Vec<String>>> {
        let mut peek = self.lexer.clone();
        match peek.next() {
            Some(Ok(DslToken::BracketOpen)) => self.lexer = peek,
            _ => return Ok(None),
        }
        let mut groups = Vec::new();
        loop {
            match self.next()? {
                Some(DslToken::BracketClose) => return Ok(Some(groups)),
                Some(DslToken::Str) => {
                    groups.push(unescape(self.lexer.slice()));
                    match self.next()? {
                        Some(DslToken::Comma) => {}
                        Some(DslToken::BracketClose) => return Ok(Some(groups)),
                        _ => return Err(self.unexpected("`,` or `]`")),
                    }
                }
                _ => return Err(self.unexpected("a quoted group or `]`")),
            }
        }
    }
}

fn flag_by_name(name: &str) -> Option<Flags> {
    Some(match name {
        "extended" => Flags::EXTENDED,
        "utf8" => Flags::UTF8,
        "raw-literal" => Flags::RAW_LITERAL,
        "newline-cr" => Flags::NEWLINE_CR,
        "newline-lf" => Flags::NEWLINE_LF,
        "newline-crlf" => Flags::NEWLINE_CRLF,
        "newline-anycrlf" => Flags::NEWLINE_ANYCRLF,
        "newline-any" => Flags::NEWLINE_ANY,
        "optimize-speed" => Flags::OPTIMIZE_SPEED,
        "optimize-size" => Flags::OPTIMIZE_SIZE,
        _ => return None,
    })
}

/// Strips the surrounding quotes and resolves string escapes.
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c) => out.push(c),
            None => out.push('\\'),
        }
    }
    out
}
