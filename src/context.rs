/*!
The thread-safe execution context.

Wraps an immutable compiled pattern for use by up to `max_workers`
concurrent callers. Each [`execute`](SharedContext::execute) call acquires
an unused matcher context from an internal pool, hands it to the callback
with exclusive ownership, and releases it on return; the pool's
acquire/release is the only synchronization on the hot path. A call
arriving while every context is busy reports `limit-exceeded` rather than
blocking.

```
use std::sync::Arc;
use librift::{Regex, SharedContext};

let re = Arc::new(Regex::new(r"\d+").unwrap());
let ctx = SharedContext::new(re, 4).unwrap();
let found = ctx
    .execute(|matcher| {
        matcher.set_input("order 66");
        matcher.find_next(0).map(|m| m.map(|m| m.range()))
    })
    .unwrap()
    .unwrap();
assert_eq!(found, Some(6..8));
```
*/

use std::sync::Arc;

use crate::{
    error::{Error, Result},
    matcher::{Cache, Matcher},
    regex::Regex,
    util::pool::Pool,
};

/// A compiled pattern shared by a bounded number of concurrent workers.
pub struct SharedContext {
    regex: Arc<Regex>,
    pool: Pool<Cache>,
    max_workers: usize,
}

impl SharedContext {
    /// Wraps `regex` for at most `max_workers` concurrent executions.
    pub fn new(regex: Arc<Regex>, max_workers: usize) -> Result<SharedContext> {
        if max_workers == 0 {
            return Err(Error::invalid_parameter("max_workers must be positive"));
        }
        Ok(SharedContext {
            regex,
            pool: Pool::with_capacity(max_workers, Cache::new),
            max_workers,
        })
    }

    pub fn regex(&self) -> &Arc<Regex> {
        &self.regex
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Runs `callback` with exclusive use of one matcher context. The
    /// context is released when the callback returns; pool exhaustion is
    /// `limit-exceeded`.
    pub fn execute<'h, T>(&self, callback: impl FnOnce(&mut Matcher<'_, 'h>) -> T) -> Result<T> {
        let cache = self
            .pool
            .get()
            .ok_or_else(|| Error::limit("all matcher contexts are in use"))?;
        let mut matcher: Matcher<'_, 'h> = Matcher::new(&self.regex, cache);
        Ok(callback(&mut matcher))
    }
}

impl std::fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedContext")
            .field("pattern", &self.regex.pattern())
            .field("max_workers", &self.max_workers)
            .finish_non_exhaustive()
    }
}
