use bevy::prelude::{
    Commands, Component, DetectChanges, Name, Node, PositionType, Query, Res, Text, TextFont, Val, With, Without,
    default,
};

use crate::host::ArenaPresenter;

#[derive(Component)]
pub struct ScoreboardText;

#[derive(Component)]
pub struct TimerText;

pub fn spawn_scoreboard(mut commands: Commands) {
    commands.spawn((
        Name::new("Scoreboard"),
        ScoreboardText,
        Text::new("Room 1 | Wins 0/0"),
        TextFont {
            font_size: 28.0,
            ..default()
        },
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            left: Val::Px(12.0),
            ..default()
        },
    ));
    commands.spawn((
        Name::new("Timer"),
        TimerText,
        Text::new("0.0s"),
        TextFont {
            font_size: 24.0,
            ..default()
        },
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            right: Val::Px(12.0),
            ..default()
        },
    ));
}

pub fn scoreboard_line(presenter: &ArenaPresenter) -> String {
    let board = presenter.scoreboard;
    format!(
        "Room {} | Wins {}/{} | {:.0}s left",
        board.room_index + 1,
        board.wins,
        board.required,
        board.seconds_remaining
    )
}

pub fn timer_line(presenter: &ArenaPresenter) -> String {
    if presenter.time_ran_out {
        "TIME!".to_string()
    } else {
        format!("{:.1}s", presenter.run_elapsed)
    }
}

pub fn update_scoreboard_text(
    presenter: Res<ArenaPresenter>,
    mut scoreboard: Query<&mut Text, (With<ScoreboardText>, Without<TimerText>)>,
    mut timer: Query<&mut Text, With<TimerText>>,
) {
    if !presenter.is_changed() {
        return;
    }

    for mut text in scoreboard.iter_mut() {
        **text = scoreboard_line(&presenter);
    }
    for mut text in timer.iter_mut() {
        **text = timer_line(&presenter);
    }
}
