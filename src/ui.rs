use anyhow::Result;
use crm_reconcile::{
    approve, commit, merge_candidates, prepare, reject, Account, ConflictKind, Contact, CrmResult,
    EntityKind, FieldPatch, MergeOutcome, MergePlan, Mergeable, Opportunity, Record, RecordStore,
    SearchState, Stored,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

/// Run a generic helper on the record type behind an entity kind
macro_rules! dispatch {
    ($kind:expr, $func:ident ( $($arg:expr),* )) => {
        match $kind {
            EntityKind::Account => $func::<Account>($($arg),*),
            EntityKind::Contact => $func::<Contact>($($arg),*),
            EntityKind::Opportunity => $func::<Opportunity>($($arg),*),
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Accounts,
    Contacts,
    Opportunities,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Accounts => Page::Contacts,
            Page::Contacts => Page::Opportunities,
            Page::Opportunities => Page::Accounts,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Accounts => Page::Opportunities,
            Page::Contacts => Page::Accounts,
            Page::Opportunities => Page::Contacts,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Page::Accounts => EntityKind::Account,
            Page::Contacts => EntityKind::Contact,
            Page::Opportunities => EntityKind::Opportunity,
        }
    }

    pub fn title(&self) -> &str {
        self.kind().plural()
    }
}

/// What the keyboard is currently driving
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Browse,
    /// Typing into the list's search box
    Search,
    /// Choosing the canonical record a proposal merges into
    PickTarget { source_id: String },
    /// Resolving fields side by side
    Merge,
    /// Typing a custom value for the selected merge field
    EditField { buffer: String },
    /// Reviewing a proposal's fields before approving it
    Approve,
    /// Typing a new value for the selected approval field
    ApproveEdit { buffer: String },
}

/// One editable field of the approval form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub key: &'static str,
    pub label: &'static str,
    pub original: String,
    pub value: String,
}

impl FormField {
    pub fn changed(&self) -> bool {
        self.value != self.original
    }
}

/// The proposal being approved, pre-filled with its own values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalForm {
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
    pub source_email: Option<String>,
    pub fields: Vec<FormField>,
}

impl ApprovalForm {
    /// Only the fields the reviewer changed
    pub fn edits(&self) -> FieldPatch {
        self.fields
            .iter()
            .filter(|f| f.changed())
            .map(|f| (f.key.to_string(), f.value.clone()))
            .collect()
    }
}

/// One list row, flattened from whichever entity kind is on screen
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: String,
    pub initials: String,
    pub name: String,
    pub pending: bool,
    pub status: String,
    pub summary: String,
}

pub struct App {
    pub store: RecordStore,
    pub current_page: Page,
    pub mode: Mode,
    pub search: SearchState,
    pub state: TableState,
    pub show_detail: bool,
    pub candidate_query: String,
    pub candidate_state: TableState,
    pub plan: Option<MergePlan>,
    pub merge_state: TableState,
    pub form: Option<ApprovalForm>,
    pub form_state: TableState,
    pub message: Option<(String, bool)>,
}

impl App {
    pub fn new(store: RecordStore) -> Self {
        let mut state = TableState::default();
        if !store.accounts.is_empty() {
            state.select(Some(0));
        }

        Self {
            store,
            current_page: Page::Accounts,
            mode: Mode::Browse,
            search: SearchState::new(),
            state,
            show_detail: false,
            candidate_query: String::new(),
            candidate_state: TableState::default(),
            plan: None,
            merge_state: TableState::default(),
            form: None,
            form_state: TableState::default(),
            message: None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.current_page.kind()
    }

    /// Rows of the current page after the search query
    pub fn rows(&self) -> Vec<RowView> {
        let query = self.search.query(self.kind());
        dispatch!(self.kind(), list_rows(&self.store, query))
    }

    /// Merge targets for the proposal being merged
    pub fn candidate_rows(&self) -> Vec<RowView> {
        match &self.mode {
            Mode::PickTarget { source_id } => dispatch!(
                self.kind(),
                candidate_rows(&self.store, source_id, &self.candidate_query)
            ),
            _ => Vec::new(),
        }
    }

    pub fn selected_row(&self) -> Option<RowView> {
        let i = self.state.selected()?;
        self.rows().into_iter().nth(i)
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.reset_selection();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
        self.reset_selection();
    }

    fn reset_selection(&mut self) {
        let len = self.rows().len();
        self.state.select(if len == 0 { None } else { Some(0) });
    }

    /// Keep the cursor inside the list after rows disappear
    fn clamp_selection(&mut self) {
        let len = self.rows().len();
        let selected = match self.state.selected() {
            _ if len == 0 => None,
            Some(i) if i >= len => Some(len - 1),
            Some(i) => Some(i),
            None => Some(0),
        };
        self.state.select(selected);
    }

    fn notify(&mut self, text: impl Into<String>) {
        self.message = Some((text.into(), false));
    }

    fn warn(&mut self, text: impl Into<String>) {
        self.message = Some((text.into(), true));
    }

    // ========================================================================
    // Review actions
    // ========================================================================

    /// Open the approval form for the selected proposal
    pub fn approve_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if !row.pending {
            self.warn(format!("{} is not awaiting review", row.name));
            return;
        }
        match dispatch!(self.kind(), approval_form(&self.store, &row.id)) {
            Ok(form) => {
                self.form = Some(form);
                self.form_state.select(Some(0));
                self.mode = Mode::Approve;
            }
            Err(e) => self.warn(e.to_string()),
        }
    }

    /// Approve with the form's edits; on failure the form stays open
    pub fn confirm_approval(&mut self) {
        let Some(form) = self.form.clone() else {
            return;
        };
        match dispatch!(form.kind, approve_one(&mut self.store, &form.id, &form.edits())) {
            Ok(name) => {
                self.notify(format!("Approved {}", name));
                self.form = None;
                self.mode = Mode::Browse;
                self.clamp_selection();
            }
            Err(e) => self.warn(e.to_string()),
        }
    }

    fn cancel_approval(&mut self) {
        self.form = None;
        self.mode = Mode::Browse;
    }

    fn selected_form_field(&mut self) -> Option<&mut FormField> {
        let i = self.form_state.selected()?;
        self.form.as_mut()?.fields.get_mut(i)
    }

    pub fn start_form_edit(&mut self) {
        let Some(field) = self.selected_form_field() else {
            return;
        };
        let buffer = field.value.clone();
        self.mode = Mode::ApproveEdit { buffer };
    }

    fn finish_form_edit(&mut self, buffer: String) {
        if let Some(field) = self.selected_form_field() {
            field.value = buffer;
        }
        self.mode = Mode::Approve;
    }

    /// Put the selected field back to the proposal's value
    pub fn revert_form_field(&mut self) {
        if let Some(field) = self.selected_form_field() {
            field.value = field.original.clone();
        }
    }

    pub fn reject_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        match dispatch!(self.kind(), reject_one(&mut self.store, &row.id)) {
            Ok((name, 0)) => self.notify(format!("Rejected {}", name)),
            Ok((name, dependents)) => self.notify(format!(
                "Rejected {} and {} dependent proposals",
                name, dependents
            )),
            Err(e) => self.warn(e.to_string()),
        }
        self.show_detail = false;
        self.clamp_selection();
    }

    /// Open the target picker for the selected proposal
    pub fn start_merge(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if !row.pending {
            self.warn(format!("{} is not awaiting review", row.name));
            return;
        }
        self.candidate_query.clear();
        self.mode = Mode::PickTarget { source_id: row.id };
        let has_candidates = !self.candidate_rows().is_empty();
        self.candidate_state
            .select(if has_candidates { Some(0) } else { None });
    }

    /// Build the merge form against the highlighted candidate
    pub fn choose_target(&mut self) {
        let Mode::PickTarget { source_id } = self.mode.clone() else {
            return;
        };
        let Some(target) = self
            .candidate_state
            .selected()
            .and_then(|i| self.candidate_rows().into_iter().nth(i))
        else {
            return;
        };

        match dispatch!(self.kind(), prepare_one(&self.store, &source_id, &target.id)) {
            Ok(plan) => {
                self.plan = Some(plan);
                self.merge_state.select(Some(0));
                self.mode = Mode::Merge;
            }
            Err(e) => self.warn(e.to_string()),
        }
    }

    fn selected_field_key(&self) -> Option<&'static str> {
        let plan = self.plan.as_ref()?;
        let i = self.merge_state.selected()?;
        plan.fields.get(i).map(|f| f.key)
    }

    pub fn take_target(&mut self) {
        if let (Some(key), Some(plan)) = (self.selected_field_key(), self.plan.as_mut()) {
            if let Err(e) = plan.take_target(key) {
                self.message = Some((e.to_string(), true));
            }
        }
    }

    pub fn take_source(&mut self) {
        if let (Some(key), Some(plan)) = (self.selected_field_key(), self.plan.as_mut()) {
            if let Err(e) = plan.take_source(key) {
                self.message = Some((e.to_string(), true));
            }
        }
    }

    pub fn start_edit(&mut self) {
        let Some(key) = self.selected_field_key() else {
            return;
        };
        let buffer = self
            .plan
            .as_ref()
            .and_then(|p| p.field(key))
            .map(|f| f.resolved.clone())
            .unwrap_or_default();
        self.mode = Mode::EditField { buffer };
    }

    fn finish_edit(&mut self, buffer: String) {
        if let (Some(key), Some(plan)) = (self.selected_field_key(), self.plan.as_mut()) {
            if let Err(e) = plan.set(key, buffer) {
                self.message = Some((e.to_string(), true));
            }
        }
        self.mode = Mode::Merge;
    }

    /// Commit the merge form; on failure the form stays open
    pub fn commit_merge(&mut self) {
        let Some(plan) = self.plan.clone() else {
            return;
        };
        match dispatch!(plan.kind, commit_one(&mut self.store, &plan)) {
            Ok(outcome) => {
                self.notify(format!(
                    "Merged into {}: {} nested moved, {} references rewritten",
                    outcome.survivor_name, outcome.nested_transferred, outcome.references_rewritten
                ));
                self.plan = None;
                self.mode = Mode::Browse;
                self.show_detail = false;
                self.clamp_selection();
            }
            Err(e) => self.warn(e.to_string()),
        }
    }

    // ========================================================================
    // Keyboard
    // ========================================================================

    /// Route one key press; returns true when the console should close
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.mode.clone() {
            Mode::Browse => return self.handle_browse_key(key),
            Mode::Search => self.handle_search_key(key),
            Mode::PickTarget { .. } => self.handle_pick_key(key),
            Mode::Merge => self.handle_merge_key(key),
            Mode::EditField { buffer } => self.handle_edit_key(key, buffer),
            Mode::Approve => self.handle_approve_key(key),
            Mode::ApproveEdit { buffer } => self.handle_approve_edit_key(key, buffer),
        }
        false
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Esc if self.show_detail => self.show_detail = false,
            KeyCode::Esc => return true,
            KeyCode::Enter => self.toggle_detail(),
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.previous_page();
                } else {
                    self.next_page();
                }
            }
            KeyCode::BackTab => self.previous_page(),
            KeyCode::Char('/') => self.mode = Mode::Search,
            KeyCode::Char('c') => {
                self.search.clear(self.kind());
                self.reset_selection();
            }
            KeyCode::Char('a') => self.approve_selected(),
            KeyCode::Char('r') => self.reject_selected(),
            KeyCode::Char('m') => self.start_merge(),
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.rows().len();
                step(&mut self.state, len, 1);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                let len = self.rows().len();
                step(&mut self.state, len, -1);
            }
            KeyCode::PageDown => {
                let len = self.rows().len();
                jump(&mut self.state, len, 20);
            }
            KeyCode::PageUp => {
                let len = self.rows().len();
                jump(&mut self.state, len, -20);
            }
            KeyCode::Home => self.reset_selection(),
            KeyCode::End => {
                let len = self.rows().len();
                if len > 0 {
                    self.state.select(Some(len - 1));
                }
            }
            _ => {}
        }
        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let kind = self.kind();
        match key.code {
            KeyCode::Enter => self.mode = Mode::Browse,
            KeyCode::Esc => {
                self.search.clear(kind);
                self.mode = Mode::Browse;
            }
            KeyCode::Backspace => {
                self.search.query_mut(kind).pop();
            }
            KeyCode::Char(c) => self.search.query_mut(kind).push(c),
            _ => return,
        }
        self.reset_selection();
    }

    fn handle_pick_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.mode = Mode::Browse,
            KeyCode::Enter => self.choose_target(),
            KeyCode::Down => {
                let len = self.candidate_rows().len();
                step(&mut self.candidate_state, len, 1);
            }
            KeyCode::Up => {
                let len = self.candidate_rows().len();
                step(&mut self.candidate_state, len, -1);
            }
            KeyCode::Backspace => {
                self.candidate_query.pop();
                self.candidate_state.select(Some(0));
            }
            KeyCode::Char(c) => {
                self.candidate_query.push(c);
                self.candidate_state.select(Some(0));
            }
            _ => {}
        }
    }

    fn handle_merge_key(&mut self, key: KeyEvent) {
        let fields = self.plan.as_ref().map(|p| p.fields.len()).unwrap_or(0);
        match key.code {
            KeyCode::Esc => {
                if let Some(plan) = self.plan.take() {
                    self.mode = Mode::PickTarget {
                        source_id: plan.source_id,
                    };
                }
            }
            KeyCode::Enter => self.commit_merge(),
            KeyCode::Char('t') => self.take_target(),
            KeyCode::Char('s') => self.take_source(),
            KeyCode::Char('e') => self.start_edit(),
            KeyCode::Down | KeyCode::Char('j') => step(&mut self.merge_state, fields, 1),
            KeyCode::Up | KeyCode::Char('k') => step(&mut self.merge_state, fields, -1),
            _ => {}
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent, mut buffer: String) {
        match key.code {
            KeyCode::Enter => self.finish_edit(buffer),
            KeyCode::Esc => self.mode = Mode::Merge,
            KeyCode::Backspace => {
                buffer.pop();
                self.mode = Mode::EditField { buffer };
            }
            KeyCode::Char(c) => {
                buffer.push(c);
                self.mode = Mode::EditField { buffer };
            }
            _ => {}
        }
    }

    fn handle_approve_key(&mut self, key: KeyEvent) {
        let fields = self.form.as_ref().map(|f| f.fields.len()).unwrap_or(0);
        match key.code {
            KeyCode::Esc => self.cancel_approval(),
            KeyCode::Enter => self.confirm_approval(),
            KeyCode::Char('e') => self.start_form_edit(),
            KeyCode::Char('u') => self.revert_form_field(),
            KeyCode::Down | KeyCode::Char('j') => step(&mut self.form_state, fields, 1),
            KeyCode::Up | KeyCode::Char('k') => step(&mut self.form_state, fields, -1),
            _ => {}
        }
    }

    fn handle_approve_edit_key(&mut self, key: KeyEvent, mut buffer: String) {
        match key.code {
            KeyCode::Enter => self.finish_form_edit(buffer),
            KeyCode::Esc => self.mode = Mode::Approve,
            KeyCode::Backspace => {
                buffer.pop();
                self.mode = Mode::ApproveEdit { buffer };
            }
            KeyCode::Char(c) => {
                buffer.push(c);
                self.mode = Mode::ApproveEdit { buffer };
            }
            _ => {}
        }
    }
}

/// Move the cursor one row, wrapping at both ends
fn step(state: &mut TableState, len: usize, delta: i32) {
    if len == 0 {
        return;
    }
    let i = match state.selected() {
        Some(i) if delta > 0 => {
            if i >= len - 1 {
                0
            } else {
                i + 1
            }
        }
        Some(i) => {
            if i == 0 {
                len - 1
            } else {
                i - 1
            }
        }
        None => 0,
    };
    state.select(Some(i));
}

/// Move the cursor a page, clamping at both ends
fn jump(state: &mut TableState, len: usize, delta: i32) {
    if len == 0 {
        return;
    }
    let current = state.selected().unwrap_or(0) as i64;
    let target = (current + delta as i64).clamp(0, len as i64 - 1);
    state.select(Some(target as usize));
}

// ============================================================================
// Per-kind helpers
// ============================================================================

fn row_view<T: Record>(record: &T) -> RowView {
    let fields = record.search_fields();
    RowView {
        id: record.id().to_string(),
        initials: record.initials().to_string(),
        name: record.display_name(),
        pending: record.is_pending(),
        status: record.status().to_string(),
        summary: fields
            .iter()
            .skip(1)
            .filter(|v| !v.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" · "),
    }
}

fn list_rows<T: Stored>(store: &RecordStore, query: &str) -> Vec<RowView> {
    crm_reconcile::search::<T>(store, query)
        .into_iter()
        .map(row_view)
        .collect()
}

fn candidate_rows<T: Stored>(store: &RecordStore, source_id: &str, query: &str) -> Vec<RowView> {
    merge_candidates::<T>(store, source_id, query)
        .into_iter()
        .map(row_view)
        .collect()
}

fn detail_rows<T: Stored>(store: &RecordStore, id: &str) -> Vec<(&'static str, String)> {
    let Ok(record) = store.get::<T>(id) else {
        return Vec::new();
    };
    let mut rows: Vec<(&'static str, String)> = T::mergeable_fields()
        .iter()
        .map(|spec| (spec.label, record.field(spec.key).unwrap_or_default()))
        .collect();
    rows.push(("Status", record.status().to_string()));
    rows.push(("Linked entries", record.nested_len().to_string()));
    if let Some(thread) = store.inbox.source_of(T::KIND, id) {
        rows.push(("Source email", thread.subject.clone()));
    }
    rows
}

fn approval_form<T: Stored>(store: &RecordStore, id: &str) -> CrmResult<ApprovalForm> {
    let record = store.get::<T>(id)?;
    let fields = T::approval_fields()
        .into_iter()
        .map(|spec| {
            let value = record.field(spec.key).unwrap_or_default();
            FormField {
                key: spec.key,
                label: spec.label,
                original: value.clone(),
                value,
            }
        })
        .collect();
    Ok(ApprovalForm {
        kind: T::KIND,
        id: id.to_string(),
        name: record.display_name(),
        source_email: store
            .inbox
            .source_of(T::KIND, id)
            .map(|t| format!("{} ({})", t.subject, t.from.name)),
        fields,
    })
}

fn approve_one<T: Stored>(store: &mut RecordStore, id: &str, edits: &FieldPatch) -> CrmResult<String> {
    approve::<T>(store, id, edits).map(|r| r.display_name())
}

/// Name of the rejected record and how many dependents went with it
fn reject_one<T: Stored>(store: &mut RecordStore, id: &str) -> CrmResult<(String, usize)> {
    reject::<T>(store, id).map(|r| (r.record.display_name(), r.dependents.len()))
}

fn prepare_one<T: Mergeable>(
    store: &RecordStore,
    source_id: &str,
    target_id: &str,
) -> CrmResult<MergePlan> {
    prepare::<T>(store, source_id, target_id)
}

fn commit_one<T: Mergeable>(store: &mut RecordStore, plan: &MergePlan) -> CrmResult<MergeOutcome> {
    commit::<T>(store, &plan.source_id, &plan.target_id, &plan.resolved_fields())
}

// ============================================================================
// Terminal loop
// ============================================================================

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.mode {
        Mode::PickTarget { .. } => render_candidates(f, chunks[1], app),
        Mode::Merge | Mode::EditField { .. } => render_merge(f, chunks[1], app),
        Mode::Approve | Mode::ApproveEdit { .. } => render_approval(f, chunks[1], app),
        Mode::Browse | Mode::Search => {
            if app.show_detail {
                let content_chunks = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([
                        Constraint::Percentage(60), // Record list
                        Constraint::Percentage(40), // Detail panel
                    ])
                    .split(chunks[1]);

                render_table(f, content_chunks[0], app);
                render_detail_panel(f, content_chunks[1], app);
            } else {
                render_table(f, chunks[1], app);
            }
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Accounts, Page::Contacts, Page::Opportunities];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
        let pending = app.store.pending_count(page.kind());
        if pending > 0 {
            tab_spans.push(Span::styled(
                format!(" ({})", pending),
                Style::default().fg(Color::Magenta),
            ));
        }
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Total: {}", app.store.count(app.kind())),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Reviewed: {}", app.store.journal.len()),
        Style::default().fg(Color::Green),
    ));
    if !app.store.inbox.is_empty() {
        let inbox = app.store.inbox.counts();
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!("Inbox: {} unread, {} quotes", inbox.unread, inbox.quotes),
            Style::default().fg(Color::Blue),
        ));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn record_rows(rows: &[RowView]) -> Vec<Row<'static>> {
    rows.iter()
        .map(|row| {
            let color = if row.pending {
                Color::Magenta
            } else if row.status == "Inactive" {
                Color::DarkGray
            } else {
                Color::White
            };

            Row::new(vec![
                Cell::from(row.initials.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(truncate(&row.name, 36)).style(Style::default().fg(color)),
                Cell::from(row.status.clone()).style(Style::default().fg(color)),
                Cell::from(truncate(&row.summary, 48)),
            ])
            .height(1)
        })
        .collect()
}

const RECORD_WIDTHS: [Constraint; 4] = [
    Constraint::Length(4),
    Constraint::Length(38),
    Constraint::Length(18),
    Constraint::Min(20),
];

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.rows();
    let query = app.search.query(app.kind());
    let title = if query.is_empty() {
        format!(" {} ", app.current_page.title())
    } else {
        format!(" {} matching \"{}\" ", app.current_page.title(), query)
    };

    let table = Table::new(record_rows(&rows), RECORD_WIDTHS)
        .header(header_row(&["", "Name", "Status", "Details"]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_candidates(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let source = match &app.mode {
        Mode::PickTarget { source_id } => source_id.clone(),
        _ => String::new(),
    };

    let input = Paragraph::new(Line::from(vec![
        Span::styled("  Search: ", Style::default().fg(Color::Cyan)),
        Span::raw(app.candidate_query.clone()),
        Span::styled("▏", Style::default().fg(Color::Yellow)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(format!(" Merge {} into… ", source)),
    );
    f.render_widget(input, chunks[0]);

    let rows = app.candidate_rows();
    let table = Table::new(record_rows(&rows), RECORD_WIDTHS)
        .header(header_row(&["", "Name", "Status", "Details"]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} candidates ", rows.len())),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[1], &mut app.candidate_state);
}

fn conflict_color(kind: ConflictKind) -> Color {
    match kind {
        ConflictKind::Same => Color::DarkGray,
        ConflictKind::OneEmpty => Color::Cyan,
        ConflictKind::Conflict => Color::Red,
    }
}

fn render_merge(f: &mut Frame, area: Rect, app: &mut App) {
    let Some(plan) = app.plan.as_ref() else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let editing = match &app.mode {
        Mode::EditField { buffer } => Some(buffer.clone()),
        _ => None,
    };
    let selected = app.merge_state.selected();

    let rows: Vec<Row> = plan
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let color = conflict_color(field.conflict);
            let resolved = match (&editing, selected) {
                (Some(buffer), Some(sel)) if sel == i => format!("{}▏", buffer),
                _ => field.resolved.clone(),
            };
            Row::new(vec![
                Cell::from(field.label),
                Cell::from(truncate(&field.existing, 28)),
                Cell::from(truncate(&field.incoming, 28)),
                Cell::from(field.conflict.as_str()).style(Style::default().fg(color)),
                Cell::from(truncate(&resolved, 30)).style(Style::default().fg(Color::Green)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(30),
            Constraint::Length(30),
            Constraint::Length(10),
            Constraint::Min(20),
        ],
    )
    .header(header_row(&["Field", "Existing", "Incoming", "", "Result"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(format!(
                " Merge {} → {} ({} conflicts) ",
                plan.source_id,
                plan.target_name,
                plan.conflicts().count()
            )),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    let footer = Paragraph::new(Line::from(vec![
        Span::styled("  Linked entries moving to target: ", Style::default().fg(Color::Cyan)),
        Span::raw(plan.transferred_nested.to_string()),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_stateful_widget(table, chunks[0], &mut app.merge_state);
    f.render_widget(footer, chunks[1]);
}

fn render_approval(f: &mut Frame, area: Rect, app: &mut App) {
    let Some(form) = app.form.as_ref() else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let editing = match &app.mode {
        Mode::ApproveEdit { buffer } => Some(buffer.clone()),
        _ => None,
    };
    let selected = app.form_state.selected();

    let rows: Vec<Row> = form
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let value = match (&editing, selected) {
                (Some(buffer), Some(sel)) if sel == i => format!("{}▏", buffer),
                _ => field.value.clone(),
            };
            let color = if field.changed() { Color::Green } else { Color::White };
            Row::new(vec![
                Cell::from(field.label),
                Cell::from(truncate(&field.original, 34)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&value, 40)).style(Style::default().fg(color)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(36),
            Constraint::Min(20),
        ],
    )
    .header(header_row(&["Field", "Proposed", "Approve as"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green))
            .title(format!(
                " Approve {} {} ({} edits) ",
                form.kind,
                form.name,
                form.edits().len()
            )),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    let source = form.source_email.clone().unwrap_or_else(|| "-".to_string());
    let footer = Paragraph::new(Line::from(vec![
        Span::styled("  Extracted from: ", Style::default().fg(Color::Cyan)),
        Span::raw(source),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_stateful_widget(table, chunks[0], &mut app.form_state);
    f.render_widget(footer, chunks[1]);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Record Details ");

    let Some(row) = app.selected_row() else {
        f.render_widget(Paragraph::new("No record selected").block(block), area);
        return;
    };

    let mut content = vec![
        Line::from(""),
        Line::from(vec![Span::styled(
            format!("  {}", row.name),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(Span::styled(
            format!("  {}", row.id),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
    ];

    for (label, value) in dispatch!(app.kind(), detail_rows(&app.store, &row.id)) {
        content.push(Line::from(vec![
            Span::styled(
                format!("  {}: ", label),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(if value.is_empty() { "-".to_string() } else { value }),
        ]));
    }

    content.push(Line::from(""));
    let hint = if row.pending {
        "  a approve · r reject · m merge · Enter close"
    } else {
        "  Press Enter to close"
    };
    content.push(Line::from(Span::styled(
        hint,
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )));

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn key_hints(mode: &Mode) -> &'static [(&'static str, &'static str)] {
    match mode {
        Mode::Browse => &[
            ("/", "Search"),
            ("a", "Approve"),
            ("r", "Reject"),
            ("m", "Merge"),
            ("Enter", "Details"),
            ("Tab", "Page"),
            ("q", "Quit"),
        ],
        Mode::Search => &[("Enter", "Done"), ("Esc", "Clear")],
        Mode::PickTarget { .. } => &[("type", "Filter"), ("Enter", "Compare"), ("Esc", "Back")],
        Mode::Merge => &[
            ("t", "Keep existing"),
            ("s", "Take incoming"),
            ("e", "Edit"),
            ("Enter", "Commit"),
            ("Esc", "Back"),
        ],
        Mode::EditField { .. } | Mode::ApproveEdit { .. } => &[("Enter", "Set"), ("Esc", "Cancel")],
        Mode::Approve => &[
            ("e", "Edit"),
            ("u", "Undo field"),
            ("Enter", "Approve"),
            ("Esc", "Cancel"),
        ],
    }
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    if let Mode::Search = app.mode {
        status_spans.push(Span::styled(" Search: ", Style::default().fg(Color::Cyan)));
        status_spans.push(Span::raw(app.search.query(app.kind()).to_string()));
        status_spans.push(Span::styled("▏", Style::default().fg(Color::Yellow)));
    } else if let Some((text, is_error)) = &app.message {
        let color = if *is_error { Color::Red } else { Color::Green };
        status_spans.push(Span::styled(format!(" {} ", text), Style::default().fg(color)));
    } else {
        let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
        status_spans.push(Span::styled(
            format!(" Row: {}/{} ", selected, app.rows().len()),
            Style::default().fg(Color::Cyan),
        ));
    }

    for (key, action) in key_hints(&app.mode) {
        status_spans.push(Span::raw(" | "));
        let color = if *key == "q" { Color::Red } else { Color::Yellow };
        status_spans.push(Span::styled(*key, Style::default().fg(color)));
        status_spans.push(Span::raw(format!(" {}", action)));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
