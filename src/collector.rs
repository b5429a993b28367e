//! Declaration collection
//!
//! An event source reports raw declarations through the
//! [`DeclarationHandler`] trait. The [`DeclarationCollector`] performs no
//! validation at all; it just records every event in the order received so
//! the model builder can resolve forward references afterwards.

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::EntityScope;
use crate::source::EventSource;

/// A raw declaration as reported by an event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationEvent {
    /// `<!ELEMENT name content_model>`
    Element {
        /// Element name
        name: String,
        /// Content specification exactly as written
        content_model: String,
    },
    /// `<!ATTLIST element definitions>`
    AttributeList {
        /// Element the definitions belong to
        element: String,
        /// Everything after the element name
        definitions: String,
    },
    /// `<!ENTITY [%] name definition>`
    Entity {
        /// Entity name
        name: String,
        /// General or parameter
        scope: EntityScope,
        /// Quoted literal or external identifier, unparsed
        definition: String,
    },
    /// `<!NOTATION name external_id>`
    Notation {
        /// Notation name
        name: String,
        /// External or public identifier, unparsed
        external_id: String,
    },
    /// `<!-- text -->`
    Comment {
        /// Comment body
        text: String,
    },
    /// `<?target data?>`
    ProcessingInstruction {
        /// PI target
        target: String,
        /// PI data
        data: String,
    },
}

impl DeclarationEvent {
    /// Replay this event into a handler
    pub fn dispatch(&self, handler: &mut dyn DeclarationHandler) -> Result<()> {
        match self {
            Self::Element {
                name,
                content_model,
            } => handler.element_decl(name, content_model),
            Self::AttributeList {
                element,
                definitions,
            } => handler.attlist_decl(element, definitions),
            Self::Entity {
                name,
                scope,
                definition,
            } => handler.entity_decl(name, *scope, definition),
            Self::Notation { name, external_id } => handler.notation_decl(name, external_id),
            Self::Comment { text } => handler.comment(text),
            Self::ProcessingInstruction { target, data } => {
                handler.processing_instruction(target, data)
            }
        }
    }

    /// Name of the declared item (target for PIs, none for comments)
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Element { name, .. }
            | Self::Entity { name, .. }
            | Self::Notation { name, .. } => Some(name),
            Self::AttributeList { element, .. } => Some(element),
            Self::ProcessingInstruction { target, .. } => Some(target),
            Self::Comment { .. } => None,
        }
    }
}

/// Receiver of declaration events.
///
/// Handlers may return an error to abort the event source; returning
/// [`Error::EndOfDtd`] asks it to stop without signalling a failure.
pub trait DeclarationHandler {
    /// An element type declaration
    fn element_decl(&mut self, name: &str, content_model: &str) -> Result<()>;

    /// An attribute-list declaration
    fn attlist_decl(&mut self, element: &str, definitions: &str) -> Result<()>;

    /// An entity declaration
    fn entity_decl(&mut self, name: &str, scope: EntityScope, definition: &str) -> Result<()>;

    /// A notation declaration
    fn notation_decl(&mut self, name: &str, external_id: &str) -> Result<()>;

    /// A comment between declarations
    fn comment(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    /// A processing instruction between declarations
    fn processing_instruction(&mut self, _target: &str, _data: &str) -> Result<()> {
        Ok(())
    }

    /// The source reached the end of the DTD
    fn end_dtd(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The collected, unprocessed declaration stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLog {
    /// Events in the order received
    pub events: Vec<DeclarationEvent>,
    /// Set when the source stopped with [`Error::EndOfDtd`]
    pub stopped_early: bool,
}

impl RawLog {
    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Handler that records every event into a [`RawLog`]
#[derive(Debug, Default)]
pub struct DeclarationCollector {
    log: RawLog,
    finished: bool,
}

impl DeclarationCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event
    pub fn record(&mut self, event: DeclarationEvent) {
        self.log.events.push(event);
    }

    /// Events recorded so far
    pub fn events(&self) -> &[DeclarationEvent] {
        &self.log.events
    }

    /// Check if the source reported the end of the DTD
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Hand over the collected log
    pub fn finish(self) -> RawLog {
        debug!(
            events = self.log.events.len(),
            stopped_early = self.log.stopped_early,
            "declaration collection finished"
        );
        self.log
    }
}

impl DeclarationHandler for DeclarationCollector {
    fn element_decl(&mut self, name: &str, content_model: &str) -> Result<()> {
        self.record(DeclarationEvent::Element {
            name: name.to_string(),
            content_model: content_model.to_string(),
        });
        Ok(())
    }

    fn attlist_decl(&mut self, element: &str, definitions: &str) -> Result<()> {
        self.record(DeclarationEvent::AttributeList {
            element: element.to_string(),
            definitions: definitions.to_string(),
        });
        Ok(())
    }

    fn entity_decl(&mut self, name: &str, scope: EntityScope, definition: &str) -> Result<()> {
        self.record(DeclarationEvent::Entity {
            name: name.to_string(),
            scope,
            definition: definition.to_string(),
        });
        Ok(())
    }

    fn notation_decl(&mut self, name: &str, external_id: &str) -> Result<()> {
        self.record(DeclarationEvent::Notation {
            name: name.to_string(),
            external_id: external_id.to_string(),
        });
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        self.record(DeclarationEvent::Comment {
            text: text.to_string(),
        });
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<()> {
        self.record(DeclarationEvent::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
        Ok(())
    }

    fn end_dtd(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Run `source` into a fresh collector.
///
/// [`Error::EndOfDtd`] is normal completion: what was collected up to that
/// point is returned with [`RawLog::stopped_early`] set. Any other error
/// aborts the collection.
pub fn collect(source: &mut dyn EventSource) -> Result<RawLog> {
    let mut collector = DeclarationCollector::new();
    match source.run(&mut collector) {
        Ok(()) => {}
        Err(Error::EndOfDtd) => {
            debug!("event source stopped at the end of the DTD");
            collector.log.stopped_early = true;
        }
        Err(err) => return Err(err),
    }
    Ok(collector.finish())
}

/// An [`EventSource`] replaying a fixed list of events.
///
/// Useful for driving the pipeline without any DTD text, e.g. from another
/// parser or from tests.
#[derive(Debug, Clone, Default)]
pub struct EventStream {
    events: Vec<DeclarationEvent>,
    stop_after: Option<usize>,
}

impl EventStream {
    /// Create a stream replaying `events`
    pub fn new(events: Vec<DeclarationEvent>) -> Self {
        Self {
            events,
            stop_after: None,
        }
    }

    /// Signal [`Error::EndOfDtd`] after `count` events instead of finishing
    pub fn with_stop_after(mut self, count: usize) -> Self {
        self.stop_after = Some(count);
        self
    }
}

impl FromIterator<DeclarationEvent> for EventStream {
    fn from_iter<I: IntoIterator<Item = DeclarationEvent>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl EventSource for EventStream {
    fn run(&mut self, handler: &mut dyn DeclarationHandler) -> Result<()> {
        for (index, event) in self.events.iter().enumerate() {
            if self.stop_after == Some(index) {
                handler.end_dtd()?;
                return Err(Error::EndOfDtd);
            }
            event.dispatch(handler)?;
        }
        handler.end_dtd()
    }
}
