use crate::errors::UsageError;
use crate::util::handle_table::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Nothing announced yet.
    Open,
    /// WillRender was called at least once.
    Announcing,
    /// PrepareRender ran, only Render is allowed until the next frame begins.
    Prepared,
}

/// Collects which actor is going to be drawn into which viewport during one host frame and enforces the call
/// order WillRender, PrepareRender, Render.
#[derive(Debug)]
pub struct FrameAccumulator {
    frame: u64,
    phase: FramePhase,
    announced: Vec<(Handle, Vec<Handle>)>,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self {
            frame: 0,
            phase: FramePhase::Open,
            announced: Vec::new(),
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn begin_frame(&mut self) {
        self.frame += 1;
        self.phase = FramePhase::Open;
        self.announced.clear();
    }

    /// Returns false if the pair was already announced in this frame.
    pub fn will_render(&mut self, actor: Handle, viewport: Handle) -> Result<bool, UsageError> {
        if self.phase == FramePhase::Prepared {
            return Err(UsageError::WillRenderAfterPrepare);
        }

        self.phase = FramePhase::Announcing;
        match self.announced.iter_mut().find(|(known, _)| *known == actor) {
            Some((_, viewports)) if viewports.contains(&viewport) => Ok(false),
            Some((_, viewports)) => {
                viewports.push(viewport);
                Ok(true)
            }
            None => {
                self.announced.push((actor, vec![viewport]));
                Ok(true)
            }
        }
    }

    /// Closes the announcement phase and hands out every announced actor with its viewports.
    pub fn begin_prepare(&mut self) -> Result<Vec<(Handle, Vec<Handle>)>, UsageError> {
        if self.phase == FramePhase::Prepared {
            return Err(UsageError::PrepareTwice);
        }

        self.phase = FramePhase::Prepared;
        Ok(self.announced.clone())
    }

    pub fn is_announced(&self, actor: Handle, viewport: Handle) -> bool {
        self.announced
            .iter()
            .any(|(known, viewports)| *known == actor && viewports.contains(&viewport))
    }

    pub fn check_render(&self, actor: Handle, viewport: Handle) -> Result<(), UsageError> {
        if self.phase != FramePhase::Prepared {
            return Err(UsageError::RenderBeforePrepare);
        }

        if !self.is_announced(actor, viewport) {
            return Err(UsageError::NotAnnounced { actor, viewport });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::handle_table::{HandleKind, HandleTable};

    fn handles() -> (Handle, Handle, Handle) {
        let actors = HandleTable::new(HandleKind::Actor);
        let viewports = HandleTable::new(HandleKind::Viewport);
        let (actor, _) = actors.insert(()).unwrap();
        let (first, _) = viewports.insert(()).unwrap();
        let (second, _) = viewports.insert(()).unwrap();
        (actor, first, second)
    }

    #[test]
    pub fn enforces_call_order() {
        let (actor, viewport, _) = handles();
        let mut frame = FrameAccumulator::new();
        frame.begin_frame();

        assert_eq!(frame.check_render(actor, viewport), Err(UsageError::RenderBeforePrepare));
        assert_eq!(frame.will_render(actor, viewport), Ok(true));
        assert_eq!(frame.begin_prepare().unwrap().len(), 1);
        assert_eq!(frame.begin_prepare(), Err(UsageError::PrepareTwice));
        assert_eq!(frame.will_render(actor, viewport), Err(UsageError::WillRenderAfterPrepare));
        assert_eq!(frame.check_render(actor, viewport), Ok(()));

        frame.begin_frame();
        assert_eq!(frame.phase(), FramePhase::Open);
        assert_eq!(frame.frame_index(), 2);
        assert_eq!(frame.check_render(actor, viewport), Err(UsageError::RenderBeforePrepare));
    }

    #[test]
    pub fn announcing_is_idempotent() {
        let (actor, first, second) = handles();
        let mut frame = FrameAccumulator::new();
        frame.begin_frame();

        assert_eq!(frame.will_render(actor, first), Ok(true));
        assert_eq!(frame.will_render(actor, first), Ok(false));
        assert_eq!(frame.will_render(actor, second), Ok(true));

        let announced = frame.begin_prepare().unwrap();
        assert_eq!(announced, vec![(actor, vec![first, second])]);
    }

    #[test]
    pub fn render_needs_an_announcement() {
        let (actor, first, second) = handles();
        let mut frame = FrameAccumulator::new();
        frame.begin_frame();
        frame.will_render(actor, first).unwrap();
        frame.begin_prepare().unwrap();

        assert_eq!(
            frame.check_render(actor, second),
            Err(UsageError::NotAnnounced {
                actor,
                viewport: second
            })
        );
    }
}
