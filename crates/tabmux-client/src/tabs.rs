//! Tab controller: opening, switching and closing sessions.

use tabmux_core::{Dimensions, MuxError, MuxResult, SessionKind};
use tracing::{debug, info, warn};

use crate::connection::ConnectionState;
use crate::controller::write_banner;
use crate::mux::{Multiplexer, MuxEvent};
use crate::reclaimer;
use crate::session::{Session, SessionKey, Target};
use crate::surface::Banner;

impl Multiplexer {
    /// Open a shell tab on `instance`/`component`.
    pub fn open_shell(&mut self, name: &str, instance: &str, component: &str) -> SessionKey {
        self.open(SessionKind::Shell, name, instance, component)
    }

    /// Open a log tail tab on `instance`/`component`.
    pub fn open_logs(&mut self, name: &str, instance: &str, component: &str) -> SessionKey {
        self.open(SessionKind::Logs, name, instance, component)
    }

    /// Open a tab, or activate it if one with the same key exists already.
    /// Either way the panel is shown.
    pub fn open(
        &mut self,
        kind: SessionKind,
        name: &str,
        instance: &str,
        component: &str,
    ) -> SessionKey {
        let target = Target::new(kind, instance, component);
        let key = SessionKey::for_target(&target);
        self.show_panel();

        if !self.registry.contains(&key) {
            let session = Session::new(name.to_string(), target, self.config.tail_lines);
            self.registry.insert(session);
            info!(key = %key, kind = ?kind, name, "session opened");
            self.events.push_back(MuxEvent::TabOpened {
                key: key.clone(),
                name: name.to_string(),
                kind,
            });
        }
        if let Err(e) = self.activate(&key) {
            warn!(key = %key, "activation failed: {e}");
        }
        key
    }

    /// Make `key` the active tab.
    ///
    /// The previously active session starts its idle grace period. The new
    /// one gets a surface and a connection if it has none, or reconnects if
    /// its connection is gone; a handshake already in flight is left alone.
    pub fn activate(&mut self, key: &SessionKey) -> MuxResult<()> {
        if !self.registry.contains(key) {
            return Err(MuxError::SessionNotFound(key.to_string()));
        }

        let grace = self.config.idle_grace();
        if let Some(previous) = self.registry.active().filter(|a| *a != key).cloned() {
            if let Some(session) = self.registry.get_mut(&previous) {
                reclaimer::arm(session, &mut self.timers, grace);
            }
        }
        self.registry.set_active(key);
        self.events.push_back(MuxEvent::TabActivated { key: key.clone() });
        debug!(key = %key, "tab activated");

        let needs_surface = match self.registry.get_mut(key) {
            Some(session) => {
                reclaimer::disarm(session, &mut self.timers);
                session.surface.is_none()
            }
            None => return Err(MuxError::SessionNotFound(key.to_string())),
        };
        if needs_surface {
            self.init_surface(key);
            return Ok(());
        }

        let (registry, mut ctl) = self.parts();
        let Some(session) = registry.get_mut(key) else {
            return Err(MuxError::SessionNotFound(key.to_string()));
        };

        match session.state() {
            ConnectionState::Open | ConnectionState::Connecting => {}
            ConnectionState::PendingConnect => ctl.request_connect(session),
            ConnectionState::Idle | ConnectionState::Closed => {
                connecting_banner(session);
                ctl.request_connect(session);
            }
        }
        ctl.refit(session);
        Ok(())
    }

    /// Create the surface of a session shown for the first time, then
    /// start connecting it. A surface that cannot be created leaves the
    /// session unconnected.
    fn init_surface(&mut self, key: &SessionKey) {
        let Some(session) = self.registry.get_mut(key) else {
            return;
        };
        let mut surface = match self.surfaces.create(key, session.kind()) {
            Ok(surface) => surface,
            Err(e) => {
                warn!(key = %key, "cannot create surface: {e}");
                return;
            }
        };
        let dims = surface
            .fit()
            .filter(Dimensions::is_usable)
            .unwrap_or(Dimensions::INITIAL);
        session.dims.store(dims);
        session.surface = Some(surface);
        debug!(key = %key, dims = %dims, "surface created");

        let (registry, mut ctl) = self.parts();
        if let Some(session) = registry.get_mut(key) {
            connecting_banner(session);
            ctl.request_connect(session);
        }
    }

    /// Close a tab. When it was the active one, the first remaining tab
    /// takes over; with nothing left the panel is hidden.
    pub fn remove(&mut self, key: &SessionKey) -> MuxResult<()> {
        let (mut session, was_active) = self
            .registry
            .remove(key)
            .ok_or_else(|| MuxError::SessionNotFound(key.to_string()))?;
        {
            let (_, mut ctl) = self.parts();
            ctl.teardown(&mut session);
        }
        info!(key = %key, "session removed");
        self.events.push_back(MuxEvent::TabClosed { key: key.clone() });

        match self.registry.first_key() {
            Some(next) if was_active => self.activate(&next),
            Some(_) => Ok(()),
            None => {
                self.hide_panel();
                Ok(())
            }
        }
    }

    /// Tear down every session and hide the panel.
    pub fn close_all(&mut self) {
        let mut sessions = self.registry.drain();
        let count = sessions.len();
        {
            let (_, mut ctl) = self.parts();
            for session in sessions.iter_mut() {
                ctl.teardown(session);
            }
        }
        self.events.extend(
            sessions
                .into_iter()
                .map(|session| MuxEvent::TabClosed { key: session.key }),
        );
        if let Some(handle) = self.resize_timer.take() {
            self.timers.cancel(handle);
        }
        if count > 0 {
            info!(count, "all sessions closed");
        }
        self.hide_panel();
    }

    fn show_panel(&mut self) {
        if self.visible {
            return;
        }
        self.panel_shown();
        self.events.push_back(MuxEvent::ShowPanel);
    }

    fn hide_panel(&mut self) {
        if !self.visible {
            return;
        }
        self.visible = false;
        self.events.push_back(MuxEvent::HidePanel);
    }
}

fn connecting_banner(session: &mut Session) {
    let banner = if session.has_connected {
        Banner::Reconnecting
    } else {
        Banner::Connecting
    };
    write_banner(session, banner);
}
