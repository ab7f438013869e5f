// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::env;
use std::{
    fs::File,
    path::{Path, PathBuf},
};

// Use the "built" crate to generate some useful build-time information,
// including the git hash and compiler version. The git hash ends up in the
// DQA_VERS keyword of every archived frame.
fn write_built() {
    built::write_built_file().expect("Failed to acquire build-time information");
}

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR env. variable not defined!"));

    // Force the binary to be recompiled for every release build, so the
    // recorded git hash is never stale.
    if env::var("DEBUG").map(|d| d == "false").unwrap_or(false) {
        let p = Path::new(&out_dir).join("rebuild_stamp");
        File::create(&p).expect("Couldn't create rebuild stamp");
        println!("cargo:rerun-if-changed={}", p.display());
    }

    write_built();
}
