//! List views: a remote collection, the filters that shape it, and the
//! rules for when it is fetched again.
//!
//! Filtering happens in two tiers that must stay separate:
//!
//! * [`ServerQuery`] (page, limit, date range, role) is sent to the backend,
//!   which decides what the page holds and how many records exist in total.
//!   Changing any of it resets to page 1 and fetches again.
//! * [`LocalFilter`] (search text, status) is a predicate over the page that
//!   was already fetched. It never issues a request and never changes the
//!   total.

use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::{GymError, GymResult};
use crate::structs::client::Client;
use crate::structs::user::{StaffRole, User};
use crate::structs::{AttendanceLog, Envelope, Member, MembershipStatus, Package};

/// Rows per page used by every paginated view.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// One page of a remote collection together with the size of the whole
/// collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

impl<T> Page<T> {
    /// A page holding an entire unpaginated collection.
    pub fn complete(items: Vec<T>) -> Self {
        let total = items.len() as u64;
        Self { items, total }
    }

    pub(crate) fn from_envelope(envelope: Envelope<Vec<T>>) -> Self {
        let items = envelope.data.unwrap_or_default();
        match envelope.total {
            Some(total) => Self { items, total },
            None => Self::complete(items),
        }
    }
}

/// Inclusive date bounds. Either end may be open.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Filters the backend applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerQuery {
    page: u32,
    limit: u32,
    date_range: DateRange,
    role: Option<StaffRole>,
}

impl Default for ServerQuery {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ServerQuery {
    /// First page with `limit` rows. A zero limit is bumped to 1.
    pub fn new(limit: u32) -> Self {
        Self {
            page: 1,
            limit: limit.max(1),
            date_range: DateRange::default(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: StaffRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = range;
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn role(&self) -> Option<StaffRole> {
        self.role
    }

    /// Query string for paginated endpoints: always `page` and `limit`, plus
    /// `start_date` / `end_date` for whichever ends of the range are set.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(start) = self.date_range.start {
            params.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.date_range.end {
            params.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }
        params
    }
}

/// Status filter offered next to the search box.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl StatusFilter {
    pub fn matches(&self, status: Option<MembershipStatus>) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => status == Some(MembershipStatus::Active),
            StatusFilter::Inactive => status == Some(MembershipStatus::Inactive),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = GymError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "inactive" => Ok(StatusFilter::Inactive),
            _ => Err(GymError::Validation(format!(
                "Unknown status filter `{s}`. Use all, active or inactive."
            ))),
        }
    }
}

/// Filters applied to the fetched page only.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct LocalFilter {
    pub search: String,
    pub status: StatusFilter,
}

/// Rows the local filter can look at.
pub trait Searchable {
    /// Fields the search text is matched against.
    fn search_fields(&self) -> Vec<&str>;

    fn status(&self) -> Option<MembershipStatus> {
        None
    }
}

impl Searchable for Member {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.email.as_str()]
    }

    fn status(&self) -> Option<MembershipStatus> {
        Some(self.membership_status)
    }
}

impl Searchable for User {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.email.as_str()]
    }

    fn status(&self) -> Option<MembershipStatus> {
        Some(User::status(self))
    }
}

impl Searchable for AttendanceLog {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.trainer.name.as_str(), self.trainer.email.as_str()]
    }

    fn status(&self) -> Option<MembershipStatus> {
        Some(self.trainer.membership_status)
    }
}

impl Searchable for Package {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }
}

/// Case-insensitive substring search plus status match, over `items` only.
pub fn apply_local_filter<'a, T: Searchable>(items: &'a [T], filter: &LocalFilter) -> Vec<&'a T> {
    let needle = filter.search.trim().to_lowercase();

    items
        .iter()
        .filter(|item| {
            needle.is_empty()
                || item
                    .search_fields()
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
        })
        .filter(|item| filter.status.matches(item.status()))
        .collect()
}

/// Page arithmetic behind the previous/next controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl Pagination {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// `Page 2 of 5`. An empty collection still reads `of 1`.
    pub fn label(&self) -> String {
        format!("Page {} of {}", self.page, self.total_pages().max(1))
    }
}

/// Where a view gets its rows from.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(&self, query: &ServerQuery) -> GymResult<Page<Self::Item>>;

    /// Whether the backend honours `page`/`limit` for this collection. Views
    /// over unpaginated sources report no [`Pagination`].
    fn paginated(&self) -> bool {
        true
    }
}

/// `/management/members`. Returns every member in one response.
#[derive(Debug, Clone)]
pub struct MemberDirectory(pub Client);

#[async_trait]
impl PageSource for MemberDirectory {
    type Item = Member;

    async fn fetch_page(&self, _query: &ServerQuery) -> GymResult<Page<Member>> {
        Ok(Page::complete(self.0.members().await?))
    }

    fn paginated(&self) -> bool {
        false
    }
}

/// `/admin/users?role=`. Filtered by role on the server, not paginated.
#[derive(Debug, Clone)]
pub struct StaffDirectory(pub Client);

#[async_trait]
impl PageSource for StaffDirectory {
    type Item = User;

    async fn fetch_page(&self, query: &ServerQuery) -> GymResult<Page<User>> {
        let role = query.role().unwrap_or_default();
        Ok(Page::complete(self.0.users(role).await?))
    }

    fn paginated(&self) -> bool {
        false
    }
}

/// `/management/attendance`, paginated and filtered by date on the server.
#[derive(Debug, Clone)]
pub struct AttendanceHistory(pub Client);

#[async_trait]
impl PageSource for AttendanceHistory {
    type Item = AttendanceLog;

    async fn fetch_page(&self, query: &ServerQuery) -> GymResult<Page<AttendanceLog>> {
        self.0.attendance(query).await
    }
}

/// `/management/packages`.
#[derive(Debug, Clone)]
pub struct PackageCatalog(pub Client);

#[async_trait]
impl PageSource for PackageCatalog {
    type Item = Package;

    async fn fetch_page(&self, _query: &ServerQuery) -> GymResult<Page<Package>> {
        Ok(Page::complete(self.0.packages().await?))
    }

    fn paginated(&self) -> bool {
        false
    }
}

/// What a call to [`ListView::refresh`] did to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// The response replaced the view's rows.
    Applied,
    /// A newer refresh was started while this one was in flight, so its
    /// response was dropped.
    Superseded,
    /// The request failed. The previous rows are still shown.
    Failed,
}

struct ViewState<T> {
    query: ServerQuery,
    local: LocalFilter,
    page: Page<T>,
    loaded: bool,
    /// Bumped by every refresh. Only the response carrying the latest value
    /// is applied.
    generation: u64,
}

/// A fetched collection plus its filters.
///
/// All methods take `&self`; the view can be shared between tasks. No lock
/// is held while a request is in flight.
pub struct ListView<S: PageSource> {
    source: S,
    state: Mutex<ViewState<S::Item>>,
}

impl<S: PageSource> ListView<S> {
    /// Creates an empty view. Nothing is fetched until [`refresh`](Self::refresh).
    pub fn new(source: S, query: ServerQuery) -> Self {
        Self {
            source,
            state: Mutex::new(ViewState {
                query,
                local: LocalFilter::default(),
                page: Page::default(),
                loaded: false,
                generation: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState<S::Item>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches the page described by the current server query.
    ///
    /// Fetch errors are logged and swallowed; the rows from the last
    /// successful fetch stay in place.
    pub async fn refresh(&self) -> Refresh {
        let (ticket, query) = {
            let mut state = self.state();
            state.generation += 1;
            (state.generation, state.query.clone())
        };

        let result = self.source.fetch_page(&query).await;

        let mut state = self.state();
        if state.generation != ticket {
            tracing::debug!(ticket, current = state.generation, "Dropping superseded response");
            return Refresh::Superseded;
        }

        match result {
            Ok(page) => {
                tracing::debug!(page = query.page(), rows = page.items.len(), total = page.total, "View refreshed");
                state.page = page;
                state.loaded = true;
                Refresh::Applied
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to fetch collection");
                Refresh::Failed
            }
        }
    }

    /// Moves to `page` (at least 1) and fetches it. Other filters are kept.
    pub async fn set_page(&self, page: u32) -> Refresh {
        self.state().query.page = page.max(1);
        self.refresh().await
    }

    /// Fetches the next page, or returns `None` when already on the last one.
    pub async fn next_page(&self) -> Option<Refresh> {
        let next = {
            let state = self.state();
            let pagination = self.pagination_of(&state)?;
            if !pagination.has_next() {
                return None;
            }
            state.query.page + 1
        };
        Some(self.set_page(next).await)
    }

    /// Fetches the previous page, or returns `None` when already on page 1.
    pub async fn previous_page(&self) -> Option<Refresh> {
        let previous = {
            let state = self.state();
            if state.query.page <= 1 {
                return None;
            }
            state.query.page - 1
        };
        Some(self.set_page(previous).await)
    }

    /// Changes the date range, resets to page 1 and fetches.
    pub async fn set_date_range(&self, range: DateRange) -> Refresh {
        {
            let mut state = self.state();
            state.query.date_range = range;
            state.query.page = 1;
        }
        self.refresh().await
    }

    /// Changes the role filter, resets to page 1 and fetches.
    pub async fn set_role(&self, role: StaffRole) -> Refresh {
        {
            let mut state = self.state();
            state.query.role = Some(role);
            state.query.page = 1;
        }
        self.refresh().await
    }

    /// Sets the search text. Applied to the current rows only; no request.
    pub fn set_search(&self, search: impl Into<String>) {
        self.state().local.search = search.into();
    }

    /// Sets the status filter. Applied to the current rows only; no request.
    pub fn set_status(&self, status: StatusFilter) {
        self.state().local.status = status;
    }

    pub fn query(&self) -> ServerQuery {
        self.state().query.clone()
    }

    pub fn local_filter(&self) -> LocalFilter {
        self.state().local.clone()
    }

    /// Whether at least one fetch has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    /// Size of the remote collection as last reported by the backend.
    pub fn total(&self) -> u64 {
        self.state().page.total
    }

    /// `None` for views over unpaginated sources.
    pub fn pagination(&self) -> Option<Pagination> {
        self.pagination_of(&self.state())
    }

    fn pagination_of(&self, state: &ViewState<S::Item>) -> Option<Pagination> {
        self.source.paginated().then(|| Pagination {
            page: state.query.page,
            limit: state.query.limit,
            total: state.page.total,
        })
    }
}

impl<S> ListView<S>
where
    S: PageSource,
    S::Item: Clone,
{
    /// Every row of the fetched page, ignoring the local filter.
    pub fn items(&self) -> Vec<S::Item> {
        self.state().page.items.clone()
    }
}

impl<S> ListView<S>
where
    S: PageSource,
    S::Item: Clone + Searchable,
{
    /// Rows of the fetched page that pass the local filter.
    pub fn visible(&self) -> Vec<S::Item> {
        let state = self.state();
        apply_local_filter(&state.page.items, &state.local)
            .into_iter()
            .cloned()
            .collect()
    }
}
