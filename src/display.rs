use anyhow::{Context, Result, anyhow};
use display_interface_spi::SPIInterface;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{CdevPin, Delay, SpidevDevice};
use ssd1306::Ssd1306;
use ssd1306::mode::{BufferedGraphicsMode, DisplayConfig as _};
use ssd1306::prelude::*;

use crate::config::DisplayConfig;
use crate::messages::RenderRequest;
use crate::render::{Screen, draw_view};

type SpiScreen = Ssd1306<
    SPIInterface<SpidevDevice, CdevPin>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

/// SSD1306 128x64 on the SPI bus, DC and RST on GPIO lines.
pub struct Oled {
    display: SpiScreen,
}

impl Oled {
    pub fn open(config: &DisplayConfig) -> Result<Self> {
        let path = config.spidev_path();
        let mut spi =
            SpidevDevice::open(&path).with_context(|| format!("failed to open {path}"))?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(config.spi_speed_hz())
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.0
            .configure(&options)
            .with_context(|| format!("failed to configure {path}"))?;

        let chip_path = config.gpio_chip();
        let mut chip = Chip::new(&chip_path)
            .with_context(|| format!("failed to open {}", chip_path.display()))?;
        let dc = CdevPin::new(
            chip.get_line(config.dc_pin)?
                .request(LineRequestFlags::OUTPUT, 0, "skimscan-dc")?,
        )
        .context("failed to request DC line")?;
        let mut reset = CdevPin::new(
            chip.get_line(config.reset_pin)?
                .request(LineRequestFlags::OUTPUT, 0, "skimscan-rst")?,
        )
        .context("failed to request RST line")?;

        let interface = SPIInterface::new(spi, dc);
        let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        let mut delay = Delay;
        display
            .reset(&mut reset, &mut delay)
            .map_err(|err| anyhow!("display reset failed: {err:?}"))?;
        display
            .init()
            .map_err(|err| anyhow!("display init failed: {err:?}"))?;
        display
            .clear(BinaryColor::Off)
            .map_err(|err| anyhow!("display clear failed: {err:?}"))?;
        display
            .flush()
            .map_err(|err| anyhow!("display flush failed: {err:?}"))?;

        Ok(Oled { display })
    }
}

impl Screen for Oled {
    fn render(&mut self, view: &RenderRequest) -> Result<()> {
        draw_view(&mut self.display, view).map_err(|err| anyhow!("draw failed: {err:?}"))?;
        self.display
            .flush()
            .map_err(|err| anyhow!("display flush failed: {err:?}"))?;
        Ok(())
    }
}
