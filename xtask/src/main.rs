/// Bundles the plugin with nih_plug_xtask. Usage:
///
///   cargo xtask bundle multitap-delay --release
///
/// The bundles land in `target/bundled/`.
fn main() -> nih_plug_xtask::Result<()> {
    nih_plug_xtask::main()
}
