use std::io;

use lexdec_core::{Element, ElementId};

/// The renderer seam: elements are shown with their resolved content and
/// hidden by id. Layout and styling belong to the implementation.
pub trait StimulusDisplay {
    fn show(&mut self, element: &Element, content: &str) -> io::Result<()>;
    fn hide(&mut self, id: &ElementId) -> io::Result<()>;
}

impl<D: StimulusDisplay + ?Sized> StimulusDisplay for &mut D {
    fn show(&mut self, element: &Element, content: &str) -> io::Result<()> {
        (**self).show(element, content)
    }

    fn hide(&mut self, id: &ElementId) -> io::Result<()> {
        (**self).hide(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Shown { id: String, content: String },
    Hidden { id: String },
}

/// Keeps a log of show/hide calls instead of drawing anything.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    pub events: Vec<DisplayEvent>,
    visible: Vec<ElementId>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.visible.iter().any(|v| v.as_str() == id)
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn shown_contents(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DisplayEvent::Shown { content, .. } => Some(content.as_str()),
                DisplayEvent::Hidden { .. } => None,
            })
            .collect()
    }
}

impl StimulusDisplay for RecordingDisplay {
    fn show(&mut self, element: &Element, content: &str) -> io::Result<()> {
        self.visible.push(element.id.clone());
        self.events.push(DisplayEvent::Shown {
            id: element.id.to_string(),
            content: content.to_owned(),
        });
        Ok(())
    }

    fn hide(&mut self, id: &ElementId) -> io::Result<()> {
        self.visible.retain(|v| v != id);
        self.events.push(DisplayEvent::Hidden { id: id.to_string() });
        Ok(())
    }
}
