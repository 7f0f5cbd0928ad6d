/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! The command-line entry point. Everything interesting is in the library.

fn main() -> Result<(), String> {
    dynGL::main(std::env::args())
}
