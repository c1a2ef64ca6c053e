// Copyright (c) 2026 OverTheFlow and Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// https://mozilla.org/MPL/2.0/.

use colored::Color;

// General Purpose
pub const TEXT_DEFAULT: Color = Color::TrueColor {
    r: 212,
    g: 212,
    b: 212,
};

pub const SEPARATOR: Color = Color::BrightBlack;

// Datapath names and other labels in summaries.
pub const LABEL: Color = Color::TrueColor {
    r: 255,
    g: 204,
    b: 102,
};

// Ping results
pub const LOSS_NONE: Color = Color::TrueColor {
    r: 170,
    g: 255,
    b: 170,
}; // Pale Lime Green

pub const LOSS_SOME: Color = Color::TrueColor {
    r: 255,
    g: 102,
    b: 102,
}; // Soft Red
