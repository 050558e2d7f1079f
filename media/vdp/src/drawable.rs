// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::Drawable;
use crate::Result;

/// Window system queries needed to present into a drawable.
pub trait DrawableService {
    /// Size of the screen drawables are displayed on.
    fn display_size(&self) -> (u32, u32);

    /// Current width and height of `drawable`.
    fn geometry(&self, drawable: Drawable) -> Result<(u32, u32)>;

    /// Returns true if `drawable` is a window rather than a pixmap.
    fn is_window(&self, drawable: Drawable) -> bool;

    /// Peeks, without consuming it, at a resize notification for `drawable` that is still
    /// pending in the event stream and returns the size it announces.
    fn pending_resize(&self, drawable: Drawable) -> Option<(u32, u32)>;
}
