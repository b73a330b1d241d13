// This file is used to ensure that all modules are linked and registered via inventory.
// Add a line here for every crate under ./modules the host should know about.
#![allow(unused_imports)]

use host_core as _;
use host_layout as _;
use profile as _;
