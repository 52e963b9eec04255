//! Scripted in-memory driver used by the unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::harvest::config::SiteSelectors;
use crate::harvest::scroll::{HEIGHT_SCRIPT, SCROLL_SCRIPT};
use crate::traits::{DriverError, DriverFactory, PageDriver};

pub const NAVIGATION_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct MockNode {
    pub text: String,
    pub attrs: HashMap<String, String>,
}

impl MockNode {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            attrs: HashMap::new(),
        }
    }

    pub fn attr(name: &str, value: &str) -> Self {
        Self::default().with_attr(name, value)
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockItem {
    pub attrs: HashMap<String, String>,
    pub children: Vec<(String, MockNode)>,
}

impl MockItem {
    /// An item matching the default selectors with a title and link.
    pub fn post(title: &str, link: &str) -> Self {
        let selectors = SiteSelectors::default();
        Self::default()
            .with_child(&selectors.title, MockNode::text(title))
            .with_child(&selectors.link, MockNode::attr("href", link))
    }

    pub fn with_child(mut self, selector: &str, node: MockNode) -> Self {
        self.children.push((selector.to_string(), node));
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub item_selector: Option<String>,
    pub items: Vec<MockItem>,
    pub top: Vec<(String, MockNode)>,
    pub heights: Vec<u64>,
    pub grow_forever: bool,
    pub stall: bool,
}

impl MockPage {
    pub fn feed(items: Vec<MockItem>) -> Self {
        Self {
            item_selector: Some(SiteSelectors::default().item),
            items,
            heights: vec![1000],
            ..Self::default()
        }
    }

    pub fn detail(author: Option<&str>) -> Self {
        let top = author
            .map(|name| vec![(SiteSelectors::default().detail_author, MockNode::text(name))])
            .unwrap_or_default();
        Self {
            top,
            ..Self::default()
        }
    }

    pub fn with_heights(mut self, heights: &[u64]) -> Self {
        self.heights = heights.to_vec();
        self
    }

    pub fn growing_forever(mut self) -> Self {
        self.grow_forever = true;
        self
    }

    /// Navigation to this page never completes.
    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct MockCounters {
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub navigations: AtomicUsize,
    pub scrolls: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct MockSite {
    pub pages: HashMap<String, MockPage>,
    pub refuse_sessions: bool,
    /// Navigating to this URL panics the calling task
    pub crash_on: Option<String>,
    pub counters: MockCounters,
}

impl MockSite {
    pub fn with_page(mut self, url: &str, page: MockPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }
}

#[derive(Clone)]
pub struct MockFactory {
    pub site: Arc<MockSite>,
}

impl MockFactory {
    pub fn new(site: MockSite) -> Self {
        Self {
            site: Arc::new(site),
        }
    }

    pub fn counters(&self) -> &MockCounters {
        &self.site.counters
    }
}

#[async_trait]
impl DriverFactory for MockFactory {
    type Session = MockSession;

    async fn open(&self) -> Result<MockSession, DriverError> {
        if self.site.refuse_sessions {
            return Err(DriverError::Session("refused".to_string()));
        }
        self.site.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession::new(self.site.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockElement {
    Item(usize),
    Child(usize, usize),
    Top(usize),
}

pub struct MockSession {
    site: Arc<MockSite>,
    current: Mutex<Option<String>>,
    height_reads: AtomicUsize,
}

impl MockSession {
    pub fn new(site: Arc<MockSite>) -> Self {
        Self {
            site,
            current: Mutex::new(None),
            height_reads: AtomicUsize::new(0),
        }
    }

    fn page(&self) -> Result<&MockPage, DriverError> {
        let current = self.current.lock().unwrap().clone();
        current
            .and_then(|url| self.site.pages.get(&url))
            .ok_or_else(|| DriverError::Other("no page loaded".to_string()))
    }

    fn node(&self, element: &MockElement) -> Result<(String, HashMap<String, String>), DriverError> {
        let page = self.page()?;
        let found = match *element {
            MockElement::Item(i) => page.items.get(i).map(|it| (String::new(), it.attrs.clone())),
            MockElement::Child(i, j) => page
                .items
                .get(i)
                .and_then(|it| it.children.get(j))
                .map(|(_, n)| (n.text.clone(), n.attrs.clone())),
            MockElement::Top(k) => page.top.get(k).map(|(_, n)| (n.text.clone(), n.attrs.clone())),
        };
        found.ok_or_else(|| DriverError::Other("stale element".to_string()))
    }
}

#[async_trait]
impl PageDriver for MockSession {
    type Element = MockElement;

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let counters = &self.site.counters;
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        counters.navigations.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(NAVIGATION_DELAY).await;
        counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.site.crash_on.as_deref() == Some(url) {
            panic!("driver crashed on {url}");
        }
        let Some(page) = self.site.pages.get(url) else {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "404".to_string(),
            });
        };
        if page.stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        *self.current.lock().unwrap() = Some(url.to_string());
        self.height_reads.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let present = {
            let page = self.page()?;
            (page.item_selector.as_deref() == Some(selector) && !page.items.is_empty())
                || page.top.iter().any(|(sel, _)| sel == selector)
        };
        if !present {
            tokio::time::sleep(timeout).await;
        }
        Ok(present)
    }

    async fn evaluate_script(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let page = self.page()?;
        if script == HEIGHT_SCRIPT {
            let read = self.height_reads.fetch_add(1, Ordering::SeqCst);
            let height = if page.grow_forever {
                (read as u64 + 1) * 1000
            } else {
                page.heights
                    .get(read)
                    .or(page.heights.last())
                    .copied()
                    .unwrap_or(0)
            };
            Ok(serde_json::json!(height))
        } else if script == SCROLL_SCRIPT {
            self.site.counters.scrolls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::Value::Null)
        } else {
            Err(DriverError::Script(format!("unexpected script: {script}")))
        }
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<MockElement>, DriverError> {
        let page = self.page()?;
        if page.item_selector.as_deref() == Some(selector) {
            return Ok((0..page.items.len()).map(MockElement::Item).collect());
        }
        Ok(page
            .top
            .iter()
            .enumerate()
            .filter(|(_, (sel, _))| sel == selector)
            .map(|(k, _)| MockElement::Top(k))
            .collect())
    }

    async fn find_one(
        &self,
        scope: &MockElement,
        selector: &str,
    ) -> Result<Option<MockElement>, DriverError> {
        let page = self.page()?;
        let MockElement::Item(i) = *scope else {
            return Ok(None);
        };
        Ok(page.items.get(i).and_then(|item| {
            item.children
                .iter()
                .position(|(sel, _)| sel == selector)
                .map(|j| MockElement::Child(i, j))
        }))
    }

    async fn attribute(
        &self,
        element: &MockElement,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(self.node(element)?.1.get(name).cloned())
    }

    async fn text(&self, element: &MockElement) -> Result<String, DriverError> {
        Ok(self.node(element)?.0)
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.site.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
