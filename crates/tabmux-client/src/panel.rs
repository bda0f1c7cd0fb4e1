//! Panel lifecycle: the host tells the multiplexer when its view becomes
//! visible, goes out of sight, or is about to unload.

use tracing::debug;

use crate::mux::Multiplexer;
use crate::reclaimer;

/// Visibility changes reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    Shown,
    Hidden,
    /// The host is going away; every session is closed.
    Unload,
}

impl Multiplexer {
    pub fn handle_panel_event(&mut self, event: PanelEvent) {
        match event {
            PanelEvent::Shown => self.panel_shown(),
            PanelEvent::Hidden => self.panel_hidden(),
            PanelEvent::Unload => self.unload(),
        }
    }

    /// The panel became visible. The active session stops its grace timer,
    /// every other Open session restarts it. Nothing reconnects.
    pub fn panel_shown(&mut self) {
        self.visible = true;
        let grace = self.config.idle_grace();
        let active = self.registry.active().cloned();
        for session in self.registry.iter_mut() {
            if active.as_ref() == Some(&session.key) {
                reclaimer::disarm(session, &mut self.timers);
            } else {
                reclaimer::arm(session, &mut self.timers, grace);
            }
        }
        debug!(sessions = self.registry.len(), "panel shown");
    }

    /// The panel went out of sight. Every Open session, the active one
    /// included, starts its grace timer.
    pub fn panel_hidden(&mut self) {
        self.visible = false;
        let grace = self.config.idle_grace();
        for session in self.registry.iter_mut() {
            reclaimer::arm(session, &mut self.timers, grace);
        }
        debug!(sessions = self.registry.len(), "panel hidden");
    }

    pub fn unload(&mut self) {
        debug!("panel unloading");
        self.close_all();
    }
}
