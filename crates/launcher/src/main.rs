use bevy::app::AppExit;

fn main() -> AppExit {
    launcher::native::run()
}
