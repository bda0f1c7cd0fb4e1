//! Idle reclaimer: closes connections of sessions nobody is looking at.
//!
//! A session in the background (not the active tab, or the panel hidden)
//! with an Open connection gets a grace timer, whether it went to the
//! background while Open or finished connecting there. When it fires and the session
//! is still in the background, its socket is closed; the session, its surface
//! and its log buffer stay.

use std::time::Duration;

use tracing::debug;

use crate::mux::TimerEvent;
use crate::session::Session;
use crate::timer::TimerWheel;

/// (Re)start the grace timer. Only Open sessions are armed; any previous
/// timer is cancelled either way. Returns whether a timer is now running.
pub(crate) fn arm(
    session: &mut Session,
    timers: &mut TimerWheel<TimerEvent>,
    grace: Duration,
) -> bool {
    disarm(session, timers);
    if !session.is_open() {
        return false;
    }
    let handle = timers.schedule(grace, TimerEvent::Reclaim(session.key.clone()));
    session.reclaim_timer = Some(handle);
    debug!(key = %session.key, grace_secs = grace.as_secs(), "idle timer armed");
    true
}

/// Cancel the grace timer, if one is running.
pub(crate) fn disarm(session: &mut Session, timers: &mut TimerWheel<TimerEvent>) -> bool {
    match session.reclaim_timer.take() {
        Some(handle) => {
            debug!(key = %session.key, "idle timer cancelled");
            timers.cancel(handle)
        }
        None => false,
    }
}

/// Whether a fired timer should actually close the connection.
pub(crate) fn should_reclaim(session: &Session, foreground: bool) -> bool {
    session.is_open() && !foreground
}
