//! Lifecycle of the single falling letter: spawn, expire, replace

use crate::network::GatewayError;
use crate::rendering::Presentation;
use log::debug;
use shared::{Request, PLACEHOLDER_LETTER};

#[derive(Debug, Clone, PartialEq)]
pub struct FallingLetter {
    pub character: char,
}

/// Owns the in-flight letter. Its vertical position lives in the
/// presentation and is read back each frame, never stored here.
#[derive(Debug, Default)]
pub struct FallingLetterLifecycle {
    current: Option<FallingLetter>,
}

impl FallingLetterLifecycle {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn current(&self) -> Option<&FallingLetter> {
        self.current.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.current.is_some()
    }

    /// Shows a placeholder until the first glyph arrives.
    pub fn spawn(&mut self, view: &mut dyn Presentation) -> Vec<Request> {
        self.current = Some(FallingLetter {
            character: PLACEHOLDER_LETTER,
        });
        view.spawn_letter(PLACEHOLDER_LETTER);
        vec![Request::NextTile]
    }

    /// Restarts the letter at the threshold and asks for a fresh glyph.
    /// The old glyph stays visible until the reply lands. A placeholder
    /// never reaches the rack.
    pub fn replace(&mut self, view: &mut dyn Presentation) -> Vec<Request> {
        let Some(letter) = self.current.as_ref() else {
            return Vec::new();
        };

        view.restart_letter();
        let mut requests = Vec::with_capacity(2);
        if letter.character != PLACEHOLDER_LETTER {
            requests.push(Request::AcceptLetter {
                letter: letter.character,
            });
        }
        requests.push(Request::NextTile);
        requests
    }

    pub fn remove(&mut self, view: &mut dyn Presentation) {
        self.current = None;
        view.remove_letter();
    }

    pub fn apply_tile(&mut self, result: Result<char, GatewayError>, view: &mut dyn Presentation) {
        match result {
            Ok(character) => match self.current.as_mut() {
                Some(letter) => {
                    letter.character = character;
                    view.set_letter(character);
                }
                None => debug!("Tile {} arrived with no letter on screen", character),
            },
            Err(e) => view.display_error(&e.describe()),
        }
    }

    /// The server answers an accepted letter with the updated rack.
    pub fn apply_rack_snapshot(
        &mut self,
        result: Result<String, GatewayError>,
        view: &mut dyn Presentation,
    ) {
        match result {
            Ok(rack) if rack.trim().is_empty() => {}
            Ok(rack) => view.display_rack(rack.trim()),
            Err(e) => view.display_error(&e.describe()),
        }
    }
}
