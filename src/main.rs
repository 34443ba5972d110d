use room_scene::SceneDefinition;

fn main() -> anyhow::Result<()> {
    let definition = match std::env::args().nth(1) {
        Some(path) => SceneDefinition::load(&path)?,
        None => SceneDefinition::builtin()?,
    };
    room_scene::run(definition)
}
