/*!
A bounded-backtracking regular expression engine designed for embedding in
tokenizers, parsers and data-ingestion pipelines: many threads may match
concurrently, patterns may be pathological, and resource exhaustion is
reported rather than fatal.

## Features
- The standard concat / alternation / quantifier / class syntax plus named
  groups, look-around, atomic groups, backreferences and the `r'…'` /
  `r"…"` raw-literal envelope. See [`syntax`] for the full grammar.
- Compilation through a Thompson NFA with optional subset construction and
  DFA minimization, lowered to a flat, endian-neutral bytecode with a
  stable serialized form ([`Regex::to_bytes`] / [`Regex::from_bytes`]).
- A bounded backtracking runtime: every match attempt is gated by depth,
  transition and wall-clock ceilings resolved through a global /
  per-pattern / per-match [limit registry](limits::LimitRegistry), with
  pluggable [bailout strategies](limits::BailoutStrategy) on top.
- Lock-free sharing of compiled patterns across threads; per-worker
  matcher contexts come from a pool ([`SharedContext`]).

## Usage
```
use librift::Regex;

let re = Regex::new(r"(?<key>\w+)=(?<value>\w+)").unwrap();
let hay = "retries=3;timeout=250";
let caps = re.captures(hay).unwrap().unwrap();
assert_eq!(&hay[caps.name("key").unwrap()], "retries");
assert_eq!(&hay[caps.name("value").unwrap()], "3");

let spans: Vec<_> = re.find_iter(hay).map(|m| m.range()).collect();
assert_eq!(spans, vec![0..9, 10..21]);
```

## Raw-literal patterns
With [`Flags::RAW_LITERAL`], a pattern may be wrapped in `r'…'` or `r"…"`.
Raw-literal patterns automatically get complexity-scaled resource limits.
```
use librift::{Flags, Regex};

let re = Regex::builder()
    .flags(Flags::RAW_LITERAL)
    .build(r"r'\d{3}-\d{2}-\d{4}'")
    .unwrap();
let m = re.find("SSN: 123-45-6789.").unwrap().unwrap();
assert_eq!(m.as_str(), "123-45-6789");
```

## Bounded backtracking
A pathological pattern on adversarial input aborts instead of hanging:
```
use std::time::Duration;
use librift::{limits::LimitConfig, ErrorKind, Regex};

let re = Regex::builder()
    .limits(LimitConfig::for_pattern(10_000, Duration::from_secs(5), 10_000))
    .build("(a+)+b")
    .unwrap();
let hay = "a".repeat(40) + "c";
let err = re.find(&hay).unwrap_err();
assert_eq!(err.kind(), ErrorKind::LimitExceeded);
```

## Crate features
- `dsl` *(default)*: the [`dsl`] `.rift` pattern-bundle façade.
- `perf-literal` *(default)*: literal prefilters for the scan loop
  (`memchr`, `aho-corasick`).
- `logging`: trace diagnostics through the `log` crate.
*/

#[macro_use]
mod macros;

mod bytecode;
mod config;
mod context;
mod error;
mod flags;
mod matcher;
mod nfa;
mod regex;
mod vm;

#[cfg(feature = "dsl")]
pub mod dsl;
pub mod limits;
pub mod syntax;
pub mod util;

pub use crate::{
    config::Config,
    context::SharedContext,
    error::{Error, ErrorKind, Result},
    flags::{Flags, NewlineMode, Objective},
    matcher::{Captures, Match, MatchState, Matcher},
    regex::{validate, CapturesIter, EngineKind, FindIter, Regex},
};
