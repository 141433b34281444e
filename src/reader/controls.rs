use std::time::Instant;

use crate::config::ControlsConfig;

/// Decides when the reader's header/footer bars are shown.
///
/// Pointer movement, scrolling, double taps and timers all write the flag
/// directly; whichever event comes last wins. Time is passed in so the event loop
/// owns the clock.
pub struct ControlsController {
    config: ControlsConfig,
    visible: bool,
    hide_at: Option<Instant>,
    scroll_hide_at: Option<Instant>,
    last_scroll_y: u32,
    last_tap: Option<Instant>,
    scroll_to_top: bool,
}

impl ControlsController {
    pub fn new(config: ControlsConfig, now: Instant) -> Self {
        let hide_at = Some(now + config.idle_hide());
        Self {
            config,
            visible: true,
            hide_at,
            scroll_hide_at: None,
            last_scroll_y: 0,
            last_tap: None,
            scroll_to_top: false,
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn show_scroll_to_top(&self) -> bool {
        self.scroll_to_top
    }

    pub fn last_scroll_y(&self) -> u32 {
        self.last_scroll_y
    }

    /// The idle timer is armed whenever the bars go from hidden to shown.
    fn show(&mut self, now: Instant) {
        if !self.visible {
            self.visible = true;
            self.hide_at = Some(now + self.config.idle_hide());
        }
    }

    fn hide(&mut self) {
        self.visible = false;
        self.hide_at = None;
    }

    /// Pointer movement and page navigation both bring the bars back.
    pub fn reveal(&mut self, now: Instant) {
        self.show(now);
    }

    /// `y` is the vertical scroll offset in pixels. Visibility only reacts on mobile.
    pub fn scrolled(&mut self, y: u32, now: Instant, mobile: bool) {
        self.scroll_to_top = y > self.config.scroll_to_top_px;

        if !mobile {
            self.last_scroll_y = y;
            return;
        }

        let hide_offset = self.config.scroll_hide_offset_px;
        if y.abs_diff(self.last_scroll_y) > self.config.scroll_noise_px {
            if y > self.last_scroll_y && y > hide_offset {
                self.hide();
            } else if y < self.last_scroll_y {
                self.show(now);
            }
        }
        self.last_scroll_y = y;

        self.scroll_hide_at = (y > hide_offset).then(|| now + self.config.scroll_hide());
    }

    /// A tap on the reading surface. Returns `true` when it completed a double tap
    /// and toggled the bars.
    pub fn tapped(&mut self, now: Instant, mobile: bool) -> bool {
        if !mobile {
            return false;
        }

        let double = self
            .last_tap
            .is_some_and(|prev| now.saturating_duration_since(prev) < self.config.double_tap_window());
        self.last_tap = Some(now);

        if double {
            self.scroll_hide_at = None;
            if self.visible {
                self.hide();
            } else {
                self.visible = true;
                self.hide_at = Some(now + self.config.double_tap_hide());
            }
        }
        double
    }

    /// Scroll position starts over with a new chapter.
    pub fn reset_scroll(&mut self) {
        self.last_scroll_y = 0;
        self.scroll_to_top = false;
        self.scroll_hide_at = None;
    }

    /// Fires due timers. Returns `true` if visibility changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut due = false;
        if self.hide_at.is_some_and(|at| now >= at) {
            self.hide_at = None;
            due = true;
        }
        if self.scroll_hide_at.is_some_and(|at| now >= at) {
            self.scroll_hide_at = None;
            due = true;
        }

        if due && self.visible {
            self.hide();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn controller(t0: Instant) -> ControlsController {
        ControlsController::new(ControlsConfig::default(), t0)
    }

    #[test]
    fn idle_timer_hides_and_pointer_restores() {
        let t0 = Instant::now();
        let mut controls = controller(t0);
        assert!(controls.visible());

        assert!(!controls.tick(t0 + ms(2999)));
        assert!(controls.tick(t0 + ms(3000)));
        assert!(!controls.visible());

        controls.reveal(t0 + ms(5000));
        assert!(controls.visible());
        assert!(!controls.tick(t0 + ms(7999)));
        assert!(controls.tick(t0 + ms(8000)));
    }

    #[test]
    fn showing_while_visible_does_not_rearm() {
        let t0 = Instant::now();
        let mut controls = controller(t0);
        controls.reveal(t0 + ms(2000));
        controls.reveal(t0 + ms(2500));
        assert!(controls.tick(t0 + ms(3000)));
    }

    #[test]
    fn double_tap_toggles_within_window() {
        let t0 = Instant::now();
        let mut controls = controller(t0);

        assert!(!controls.tapped(t0, true));
        assert!(controls.tapped(t0 + ms(399), true));
        assert!(!controls.visible());

        // 400 ms or more apart: two single taps.
        assert!(!controls.tapped(t0 + ms(1000), true));
        assert!(!controls.tapped(t0 + ms(1400), true));
        assert!(!controls.visible());
    }

    #[test]
    fn double_tap_show_uses_longer_timer() {
        let t0 = Instant::now();
        let mut controls = controller(t0);
        controls.tick(t0 + ms(3000));
        assert!(!controls.visible());

        controls.tapped(t0 + ms(4000), true);
        assert!(controls.tapped(t0 + ms(4100), true));
        assert!(controls.visible());
        assert!(!controls.tick(t0 + ms(4100 + 3000)));
        assert!(controls.tick(t0 + ms(4100 + 6000)));
    }

    #[test]
    fn taps_are_ignored_on_desktop() {
        let t0 = Instant::now();
        let mut controls = controller(t0);
        assert!(!controls.tapped(t0, false));
        assert!(!controls.tapped(t0 + ms(100), false));
        assert!(controls.visible());
    }

    #[test]
    fn mobile_scroll_direction_drives_visibility() {
        let t0 = Instant::now();
        let mut controls = controller(t0);

        // Below the noise threshold.
        controls.scrolled(4, t0, true);
        assert!(controls.visible());

        // Down but still near the top.
        controls.scrolled(40, t0, true);
        assert!(controls.visible());

        controls.scrolled(120, t0 + ms(10), true);
        assert!(!controls.visible());

        controls.scrolled(90, t0 + ms(20), true);
        assert!(controls.visible());

        // Pointer after a downward scroll: last event wins.
        controls.scrolled(200, t0 + ms(30), true);
        controls.reveal(t0 + ms(31));
        assert!(controls.visible());
    }

    #[test]
    fn scroll_timer_hides_after_quiet_period() {
        let t0 = Instant::now();
        let mut controls = controller(t0);
        controls.scrolled(100, t0, true);
        controls.scrolled(98, t0 + ms(500), true);
        controls.reveal(t0 + ms(600));
        controls.reveal(t0 + ms(700));

        assert!(controls.visible());
        // Idle timer armed by the pointer at 600 ms.
        assert!(!controls.tick(t0 + ms(3599)));
        assert!(controls.tick(t0 + ms(3600)));

        // Double tap shows with a 6 s timer; a jitter-sized scroll past 50 px
        // re-arms the 4 s scroll timer, which fires first.
        let t1 = t0 + ms(10_000);
        controls.tapped(t1, true);
        assert!(controls.tapped(t1 + ms(100), true));
        controls.scrolled(100, t1 + ms(200), true);
        assert!(controls.visible());
        assert!(!controls.tick(t1 + ms(4199)));
        assert!(controls.tick(t1 + ms(4200)));

        // Near the top the scroll timer is not armed.
        let t2 = t1 + ms(10_000);
        controls.tapped(t2, true);
        assert!(controls.tapped(t2 + ms(100), true));
        controls.scrolled(45, t2 + ms(200), true);
        assert!(controls.visible());
        assert!(!controls.tick(t2 + ms(4500)));
        assert!(controls.tick(t2 + ms(6100)));
    }

    #[test]
    fn scroll_to_top_is_independent_of_controls() {
        let t0 = Instant::now();
        let mut controls = controller(t0);
        controls.scrolled(301, t0, false);
        assert!(controls.show_scroll_to_top());
        assert!(controls.visible());

        controls.scrolled(300, t0, false);
        assert!(!controls.show_scroll_to_top());

        controls.scrolled(900, t0, true);
        controls.reset_scroll();
        assert!(!controls.show_scroll_to_top());
        assert_eq!(controls.last_scroll_y(), 0);
    }
}
