fn main() -> std::process::ExitCode {
    wellsync_lib::run()
}
