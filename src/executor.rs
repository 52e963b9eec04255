use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::model::HarvestIssue;
use crate::traits::{navigate_within, DriverFactory, PageDriver};

/// Output of one resolution pass: every requested link maps to a username or
/// `None`, and each `None` has a matching issue.
#[derive(Debug, Default)]
pub struct Resolution {
    pub usernames: HashMap<String, Option<String>>,
    pub errors: Vec<HarvestIssue>,
}

impl Resolution {
    pub fn resolved(&self) -> usize {
        self.usernames.values().filter(|v| v.is_some()).count()
    }
}

type Queue = Arc<Mutex<VecDeque<String>>>;

/// Resolves the author of each record by visiting its detail page.
///
/// A fixed number of workers each open their own session from the factory
/// and pull links from a shared queue until it drains, so at most
/// `concurrency` navigations are in flight. Sessions are never shared.
pub struct UsernameResolver<F: DriverFactory> {
    factory: Arc<F>,
    author_selector: String,
    author_wait: Duration,
    navigation_timeout: Duration,
    concurrency: usize,
}

impl<F> UsernameResolver<F>
where
    F: DriverFactory + 'static,
{
    pub fn new(factory: Arc<F>, author_selector: impl Into<String>, author_wait: Duration) -> Self {
        Self {
            factory,
            author_selector: author_selector.into(),
            author_wait,
            navigation_timeout: Duration::from_secs(30),
            concurrency: 5,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_navigation_timeout(mut self, limit: Duration) -> Self {
        self.navigation_timeout = limit;
        self
    }

    /// Never fails: a link whose page cannot be loaded, or whose author
    /// anchor does not appear within the wait, maps to `None`.
    #[instrument(skip_all, fields(links = links.len(), concurrency = self.concurrency))]
    pub async fn resolve(&self, links: Vec<String>) -> Resolution {
        let mut resolution = Resolution::default();
        if links.is_empty() {
            return resolution;
        }

        let queue: Queue = Arc::new(Mutex::new(links.iter().cloned().collect()));
        let workers = self.concurrency.min(links.len());
        info!(workers, "Resolving usernames");

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let factory = self.factory.clone();
            let queue = queue.clone();
            let selector = self.author_selector.clone();
            let waits = (self.navigation_timeout, self.author_wait);
            pool.spawn(async move { run_worker(worker, factory, queue, selector, waits).await });
        }

        let mut outcomes: HashMap<String, Result<String, String>> = HashMap::new();
        let mut crashed = false;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(WorkerReport::Done(done)) => {
                    // Duplicate links: the first outcome collected wins.
                    for (link, outcome) in done {
                        outcomes.entry(link).or_insert(outcome);
                    }
                }
                Ok(WorkerReport::NoSession(message)) => {
                    resolution.errors.push(HarvestIssue::new("resolver session", message));
                }
                Err(e) => {
                    error!(error = %e, "Resolver worker panicked");
                    resolution
                        .errors
                        .push(HarvestIssue::new("resolver worker", format!("worker failed: {e}")));
                    crashed = true;
                }
            }
        }

        // A crashed worker takes its finished outcomes and its tab with it, so
        // its links cannot be told apart from ones no worker reached.
        let unreached = if crashed {
            "lost with a failed resolver worker"
        } else {
            "no resolver session available"
        };

        for link in links {
            let username = match outcomes.remove(&link) {
                Some(Ok(name)) => Some(name),
                Some(Err(message)) => {
                    resolution.errors.push(HarvestIssue::new(link.clone(), message));
                    None
                }
                None if resolution.usernames.contains_key(&link) => continue,
                None => {
                    resolution.errors.push(HarvestIssue::new(link.clone(), unreached));
                    None
                }
            };
            resolution.usernames.insert(link, username);
        }

        info!(resolved = resolution.resolved(), failed = resolution.errors.len(), "Username resolution finished");
        resolution
    }
}

enum WorkerReport {
    Done(Vec<(String, Result<String, String>)>),
    NoSession(String),
}

fn next_link(queue: &Queue) -> Option<String> {
    queue.lock().ok()?.pop_front()
}

async fn run_worker<F: DriverFactory>(
    worker: usize,
    factory: Arc<F>,
    queue: Queue,
    selector: String,
    (navigation_timeout, author_wait): (Duration, Duration),
) -> WorkerReport {
    let session = match factory.open().await {
        Ok(session) => session,
        Err(e) => {
            warn!(worker, error = %e, "Resolver worker could not open a session");
            return WorkerReport::NoSession(e.to_string());
        }
    };

    let mut done = Vec::new();
    while let Some(link) = next_link(&queue) {
        let outcome = author_on_page(&session, &link, &selector, navigation_timeout, author_wait).await;
        match &outcome {
            Ok(name) => debug!(worker, %link, username = %name, "Resolved"),
            Err(message) => warn!(worker, %link, %message, "Username not resolved"),
        }
        done.push((link, outcome));
    }

    if let Err(e) = session.close().await {
        warn!(worker, error = %e, "Failed to close resolver session");
    }
    WorkerReport::Done(done)
}

async fn author_on_page<D: PageDriver>(
    session: &D,
    link: &str,
    selector: &str,
    navigation_timeout: Duration,
    wait: Duration,
) -> Result<String, String> {
    navigate_within(session, link, navigation_timeout)
        .await
        .map_err(|e| e.to_string())?;

    let appeared = session
        .wait_for_selector(selector, wait)
        .await
        .map_err(|e| e.to_string())?;
    if !appeared {
        return Err(format!(
            "author element did not appear within {}ms",
            wait.as_millis()
        ));
    }

    let anchors = session.find_all(selector).await.map_err(|e| e.to_string())?;
    let anchor = anchors
        .first()
        .ok_or_else(|| "author element vanished".to_string())?;
    let name = session.text(anchor).await.map_err(|e| e.to_string())?;

    let name = name.trim();
    if name.is_empty() {
        return Err("author element is empty".to_string());
    }
    Ok(name.to_string())
}
