use serde::{Deserialize, Serialize};

/// Addressable parts of the presentation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Instructions,
    Baseline,
    Marker,
    Ready,
    ReadyLabel,
    Symbol,
    Message,
    Dot,
    Media(usize),
    Cell { x: usize, y: usize },
}

/// Response feedback painted on an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Correct,
    Incorrect,
}

/// Cursor styling of a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    Center,
    Left,
    Right,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub fn from_path(path: &str) -> Option<Self> {
        match path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
            Some(ext) if ext == "mp4" => Some(Self::Video),
            Some(ext) if ext == "png" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Imperative presentation layer.
///
/// Calls return once issued; the visual commit may happen later, which is
/// why sequencers route visible changes through the scheduler.
pub trait Surface: Send {
    fn show(&mut self, element: Element);
    fn hide(&mut self, element: Element);
    fn set_text(&mut self, element: Element, text: &str);

    fn mark(&mut self, _element: Element, _mark: Mark) {}
    fn clear_marks(&mut self, _element: Element) {}

    fn load_media(&mut self, _index: usize, _kind: MediaKind, _path: &str) {}
    fn play(&mut self, _index: usize) {}
    fn rewind(&mut self, _index: usize) {}

    fn highlight(&mut self, _element: Element, _style: Highlight) {}
    fn clear_highlights(&mut self) {}
    fn opacity(&mut self, _element: Element, _value: f32) {}

    /// Speech output, handled by an external synthesizer
    fn announce(&mut self, _text: &str) {}
}

/// A single recorded surface call
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Show(Element),
    Hide(Element),
    SetText(Element, String),
    Mark(Element, Mark),
    ClearMarks(Element),
    LoadMedia(usize, MediaKind, String),
    Play(usize),
    Rewind(usize),
    Highlight(Element, Highlight),
    ClearHighlights,
    Opacity(Element, f32),
    Announce(String),
}

/// Surface that records every call
#[derive(Debug, Default)]
pub struct Recording {
    pub calls: Vec<SurfaceCall>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text of `element`, from the last `set_text`
    pub fn text(&self, element: Element) -> Option<&str> {
        self.calls.iter().rev().find_map(|call| match call {
            SurfaceCall::SetText(e, text) if *e == element => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn is_visible(&self, element: Element) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|call| match call {
                SurfaceCall::Show(e) if *e == element => Some(true),
                SurfaceCall::Hide(e) if *e == element => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Highlights set since the last `clear_highlights`
    pub fn highlights(&self) -> Vec<(Element, Highlight)> {
        let start = self
            .calls
            .iter()
            .rposition(|c| matches!(c, SurfaceCall::ClearHighlights))
            .map_or(0, |i| i + 1);
        self.calls[start..]
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Highlight(e, h) => Some((*e, *h)),
                _ => None,
            })
            .collect()
    }

    pub fn announcements(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Announce(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for Recording {
    fn show(&mut self, element: Element) {
        self.calls.push(SurfaceCall::Show(element));
    }
    fn hide(&mut self, element: Element) {
        self.calls.push(SurfaceCall::Hide(element));
    }
    fn set_text(&mut self, element: Element, text: &str) {
        self.calls.push(SurfaceCall::SetText(element, text.to_owned()));
    }
    fn mark(&mut self, element: Element, mark: Mark) {
        self.calls.push(SurfaceCall::Mark(element, mark));
    }
    fn clear_marks(&mut self, element: Element) {
        self.calls.push(SurfaceCall::ClearMarks(element));
    }
    fn load_media(&mut self, index: usize, kind: MediaKind, path: &str) {
        self.calls
            .push(SurfaceCall::LoadMedia(index, kind, path.to_owned()));
    }
    fn play(&mut self, index: usize) {
        self.calls.push(SurfaceCall::Play(index));
    }
    fn rewind(&mut self, index: usize) {
        self.calls.push(SurfaceCall::Rewind(index));
    }
    fn highlight(&mut self, element: Element, style: Highlight) {
        self.calls.push(SurfaceCall::Highlight(element, style));
    }
    fn clear_highlights(&mut self) {
        self.calls.push(SurfaceCall::ClearHighlights);
    }
    fn opacity(&mut self, element: Element, value: f32) {
        self.calls.push(SurfaceCall::Opacity(element, value));
    }
    fn announce(&mut self, text: &str) {
        self.calls.push(SurfaceCall::Announce(text.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_follows_extension() {
        assert_eq!(
            MediaKind::from_path("assets/media/extension_left.mp4"),
            Some(MediaKind::Video)
        );
        assert_eq!(MediaKind::from_path("cue.PNG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path("cue.gif"), None);
        assert_eq!(MediaKind::from_path("no_extension"), None);
    }

    #[test]
    fn recording_tracks_visibility_and_text() {
        let mut surface = Recording::new();
        surface.show(Element::Marker);
        surface.set_text(Element::Symbol, "7");
        surface.hide(Element::Marker);
        surface.set_text(Element::Symbol, "");

        assert!(!surface.is_visible(Element::Marker));
        assert!(!surface.is_visible(Element::Dot));
        assert_eq!(surface.text(Element::Symbol), Some(""));
    }

    #[test]
    fn highlights_reset_on_clear() {
        let mut surface = Recording::new();
        surface.highlight(Element::Cell { x: 0, y: 0 }, Highlight::Center);
        surface.clear_highlights();
        surface.highlight(Element::Cell { x: 1, y: 1 }, Highlight::Center);
        assert_eq!(
            surface.highlights(),
            vec![(Element::Cell { x: 1, y: 1 }, Highlight::Center)]
        );
    }
}
