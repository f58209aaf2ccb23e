use casement::{Config, Driver, Event, Window};
use geometry::{Extent, Point};
use surface::Color;

fn main() -> casement::Result<()> {
    let config = Config::load_or_default("casement.toml")?;
    casement::init_logging(&config);

    let driver = Driver::winit(config)?;
    let window = driver.open_window(Extent::new(640, 480))?;
    window.set_title("casement")?;

    let mut shade = 0u8;
    draw(&window, shade);
    window.flush(&[])?;

    while let Some(event) = window.next_event() {
        println!("{event:?}");

        match event {
            Event::KeyTyped { chord } => {
                if chord == "escape" {
                    window.close()?;
                    continue;
                }
                shade = shade.wrapping_add(32);
                draw(&window, shade);
                window.flush(&[])?;
            }
            Event::Resize { .. } => {
                draw(&window, shade);
                window.flush(&[])?;
            }
            Event::Close => window.close()?,
            _ => {}
        }
    }

    driver.shutdown()
}

/// Fills the window with a gradient. The surface keeps its original size
/// across resizes.
fn draw(window: &Window, shade: u8) {
    let mut screen = window.screen();
    let (width, height) = (screen.width(), screen.height());

    for y in 0..height {
        for x in 0..width {
            #[allow(clippy::cast_possible_truncation)]
            let color = Color::new((x * 255 / width) as u8, (y * 255 / height) as u8, shade, 255);
            screen.set_pixel(Point::new(x, y), color);
        }
    }
}
