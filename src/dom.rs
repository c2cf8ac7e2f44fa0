//! Page collaborators: the traits startup drives, an in-memory document that
//! implements them, and the click/touch input binder.
//!
//! Everything here runs on the page's single thread, so elements are shared
//! with `Rc` and mutated through `RefCell`/`Cell`.

use crate::i18n::Direction;
use crate::reporter::{FailureEvent, FailureListener, FailureSink};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// Identifier of the language selection control.
pub const LANGUAGE_MENU_ID: &str = "languageMenu";

#[derive(Debug, Error)]
pub enum PageError {
    #[error("page update failed: {0}")]
    Update(String),
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),
}

// ==================== Input Events ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    TouchEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    kind: EventKind,
    default_prevented: bool,
}

impl InputEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            default_prevented: false,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Stop the platform's default action, e.g. the click synthesized after a touch.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

pub type Handler = Rc<dyn Fn(&mut InputEvent)>;

// ==================== Elements ====================

/// A page element with an id, a class list and event listeners.
pub struct Element {
    id: String,
    class_name: RefCell<String>,
    hidden: Cell<bool>,
    listeners: RefCell<Vec<(EventKind, Handler)>>,
}

impl Element {
    pub fn new(id: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            id: id.into(),
            class_name: RefCell::new(String::new()),
            hidden: Cell::new(false),
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class_name(&self) -> String {
        self.class_name.borrow().clone()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_name.borrow().split_whitespace().any(|c| c == class)
    }

    /// Append a class to the class list.
    pub fn add_class(&self, class: &str) {
        let mut class_name = self.class_name.borrow_mut();
        if !class_name.is_empty() {
            class_name.push(' ');
        }
        class_name.push_str(class);
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    pub fn hide(&self) {
        self.hidden.set(true);
    }

    pub fn add_listener(&self, kind: EventKind, handler: Handler) {
        self.listeners.borrow_mut().push((kind, handler));
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.borrow().iter().filter(|(k, _)| *k == kind).count()
    }

    /// Run every listener registered for the event's kind.
    pub fn dispatch(&self, event: &mut InputEvent) {
        // Snapshot so a handler may register further listeners.
        let handlers: Vec<Handler> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(kind, _)| *kind == event.kind())
            .map(|(_, handler)| Rc::clone(handler))
            .collect();

        for handler in handlers {
            handler(event);
        }
    }

    /// A mouse click.
    pub fn click(&self) {
        self.dispatch(&mut InputEvent::new(EventKind::Click));
    }

    /// A finger tap: touch-end, then the platform's synthesized click unless
    /// the touch-end was default-prevented.
    pub fn tap(&self) {
        let mut touch = InputEvent::new(EventKind::TouchEnd);
        self.dispatch(&mut touch);
        if !touch.default_prevented() {
            self.click();
        }
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("class_name", &self.class_name.borrow())
            .field("hidden", &self.hidden.get())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

// ==================== Collaborator Traits ====================

/// Element lookup by id.
pub trait ElementLookup {
    fn element_by_id(&self, id: &str) -> Option<Rc<Element>>;
}

/// One choice of the language menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub label: String,
    pub value: String,
    pub selected: bool,
}

/// The language selection control.
pub trait LanguageMenu {
    fn clear(&mut self);
    fn add_option(&mut self, option: MenuOption);
    fn len(&self) -> usize;
    fn hide(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What startup needs from the hosting page.
pub trait Page: ElementLookup {
    fn set_title(&mut self, title: &str) -> Result<(), PageError>;
    fn set_direction(&mut self, direction: Direction) -> Result<(), PageError>;
    fn set_language(&mut self, code: &str) -> Result<(), PageError>;

    /// The language control, if this page renders one.
    fn language_menu(&mut self) -> Option<&mut dyn LanguageMenu>;

    /// Available screen width in CSS pixels.
    fn screen_width(&self) -> u32;

    /// Replace the viewport directive. Returns `Ok(false)` if the page has none.
    fn set_viewport(&mut self, content: &str) -> Result<bool, PageError>;
}

// ==================== In-memory Document ====================

/// `<select>`-like language control backed by an element.
#[derive(Debug)]
pub struct SelectMenu {
    element: Rc<Element>,
    options: Vec<MenuOption>,
}

impl SelectMenu {
    pub fn options(&self) -> &[MenuOption] {
        &self.options
    }

    pub fn selected(&self) -> Option<&MenuOption> {
        self.options.iter().find(|o| o.selected)
    }

    pub fn is_hidden(&self) -> bool {
        self.element.is_hidden()
    }
}

impl LanguageMenu for SelectMenu {
    fn clear(&mut self) {
        self.options.clear();
    }

    fn add_option(&mut self, option: MenuOption) {
        self.options.push(option);
    }

    fn len(&self) -> usize {
        self.options.len()
    }

    fn hide(&mut self) {
        self.element.hide();
    }
}

/// Headless page used by tests and the preview binary.
#[derive(Default)]
pub struct Document {
    title: String,
    direction: Option<Direction>,
    language: Option<String>,
    elements: HashMap<String, Rc<Element>>,
    language_menu: Option<SelectMenu>,
    viewport: Option<String>,
    screen_width: u32,
    failure_listener: Option<FailureListener>,
}

impl Document {
    pub fn new(screen_width: u32) -> Self {
        Self {
            screen_width,
            ..Self::default()
        }
    }

    /// Add an element and return it.
    pub fn add_element(&mut self, id: &str) -> Rc<Element> {
        let element = Element::new(id);
        self.elements.insert(id.to_string(), Rc::clone(&element));
        element
    }

    pub fn with_element(mut self, id: &str) -> Self {
        self.add_element(id);
        self
    }

    pub fn with_language_menu(mut self) -> Self {
        let element = self.add_element(LANGUAGE_MENU_ID);
        self.language_menu = Some(SelectMenu {
            element,
            options: vec![MenuOption {
                label: "placeholder".to_string(),
                value: String::new(),
                selected: false,
            }],
        });
        self
    }

    pub fn with_viewport(mut self, content: &str) -> Self {
        self.viewport = Some(content.to_string());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn menu(&self) -> Option<&SelectMenu> {
        self.language_menu.as_ref()
    }

    pub fn viewport(&self) -> Option<&str> {
        self.viewport.as_deref()
    }

    /// Deliver an uncaught failure to the registered listener, if any.
    pub fn raise(&self, event: &FailureEvent) {
        match &self.failure_listener {
            Some(listener) => listener(event),
            None => debug!("Uncaught failure with no listener: {}", event.message),
        }
    }
}

impl ElementLookup for Document {
    fn element_by_id(&self, id: &str) -> Option<Rc<Element>> {
        self.elements.get(id).cloned()
    }
}

impl Page for Document {
    fn set_title(&mut self, title: &str) -> Result<(), PageError> {
        self.title = title.to_string();
        Ok(())
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), PageError> {
        self.direction = Some(direction);
        Ok(())
    }

    fn set_language(&mut self, code: &str) -> Result<(), PageError> {
        self.language = Some(code.to_string());
        Ok(())
    }

    fn language_menu(&mut self) -> Option<&mut dyn LanguageMenu> {
        self.language_menu
            .as_mut()
            .map(|menu| menu as &mut dyn LanguageMenu)
    }

    fn screen_width(&self) -> u32 {
        self.screen_width
    }

    fn set_viewport(&mut self, content: &str) -> Result<bool, PageError> {
        match self.viewport.as_mut() {
            Some(viewport) => {
                *viewport = content.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl FailureSink for Document {
    fn set_failure_listener(&mut self, listener: FailureListener) -> bool {
        if self.failure_listener.is_some() {
            return false;
        }
        self.failure_listener = Some(listener);
        true
    }
}

// ==================== Input Binder ====================

/// Element to bind: either a handle or an id to look up.
pub enum Target<'a> {
    Id(&'a str),
    Element(Rc<Element>),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(id: &'a str) -> Self {
        Target::Id(id)
    }
}

impl From<Rc<Element>> for Target<'_> {
    fn from(element: Rc<Element>) -> Self {
        Target::Element(element)
    }
}

/// Bind `handler` to a button so that a click or a tap activates it once.
///
/// On touch screens the touch-end listener suppresses the synthesized click,
/// so the handler does not run twice. An id that does not resolve is a wiring
/// bug and is returned as [`BindError::ElementNotFound`].
pub fn bind_click<'a, F>(
    lookup: &dyn ElementLookup,
    target: impl Into<Target<'a>>,
    handler: F,
) -> Result<Rc<Element>, BindError>
where
    F: Fn(&mut InputEvent) + 'static,
{
    let element = match target.into() {
        Target::Element(element) => element,
        Target::Id(id) => {
            if id.is_empty() {
                return Err(BindError::ElementNotFound(String::new()));
            }
            lookup
                .element_by_id(id)
                .ok_or_else(|| BindError::ElementNotFound(id.to_string()))?
        }
    };

    let handler: Handler = Rc::new(handler);
    element.add_listener(EventKind::Click, Rc::clone(&handler));

    let touch_handler: Handler = Rc::new(move |event: &mut InputEvent| {
        event.prevent_default();
        handler(event);
    });
    element.add_listener(EventKind::TouchEnd, touch_handler);

    Ok(element)
}
